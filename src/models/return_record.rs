/*!
 * # Return Records
 *
 * Input types describing a returned retail item, plus the categorical vocabularies
 * the engine recognises. Categorical fields are kept as raw strings on the record so
 * unknown values can degrade to documented defaults instead of failing.
 */

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;

const DEFAULT_CUSTOMER_AGE: u32 = 30;
const DEFAULT_PURCHASE_CHANNEL: &str = "online";
const DEFAULT_WARRANTY_STATUS: &str = "expired";
const DEFAULT_MARKET_LEVEL: &str = "medium";

/// A single returned item as seen by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_original_price"))]
pub struct ReturnRecord {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub product_name: String,
    pub category: String,
    pub condition: String,
    pub return_reason: String,
    /// Original selling price, strictly positive
    pub original_price: f64,
    pub customer_age: u32,
    pub purchase_channel: String,
    pub location: String,
    pub return_date: NaiveDateTime,
    /// Expected to precede `return_date`, not enforced
    pub manufacturing_date: NaiveDateTime,
    pub warranty_status: String,
    pub material_composition: Vec<String>,
    pub seasonality: String,
    pub market_demand: String,
}

impl ReturnRecord {
    /// Whole days between manufacture and return, floored like a calendar day count.
    /// Negative when the manufacturing date is after the return date.
    pub fn item_age_days(&self) -> i64 {
        (self.return_date - self.manufacturing_date)
            .num_seconds()
            .div_euclid(86_400)
    }
}

fn validate_original_price(record: &ReturnRecord) -> Result<(), ValidationError> {
    let price = record.original_price;
    if !price.is_finite() || price <= 0.0 {
        let mut err = ValidationError::new("original_price");
        err.message = Some("original_price must be a finite value greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// One row of a returns training dataset.
///
/// Dates arrive as text and optional columns fall back to the same defaults the
/// returns feed uses when a field is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRow {
    pub sku: String,
    pub product_name: String,
    pub category: String,
    pub condition: String,
    pub return_reason: String,
    pub original_price: f64,
    #[serde(default)]
    pub customer_age: Option<u32>,
    #[serde(default)]
    pub purchase_channel: Option<String>,
    pub location: String,
    pub return_date: String,
    #[serde(default)]
    pub manufacturing_date: Option<String>,
    #[serde(default)]
    pub warranty_status: Option<String>,
    /// Comma separated material tags
    #[serde(default)]
    pub material_composition: Option<String>,
    #[serde(default)]
    pub seasonality: Option<String>,
    #[serde(default)]
    pub market_demand: Option<String>,
    pub actual_disposition: String,
    #[serde(default)]
    pub value_recovered: Option<f64>,
}

impl ReturnRow {
    /// Builds a [`ReturnRecord`], parsing dates and applying column defaults.
    pub fn to_record(&self) -> Result<ReturnRecord, ServiceError> {
        let return_date = parse_datetime("return_date", &self.return_date)?;
        let manufacturing_date = match self.manufacturing_date.as_deref() {
            Some(raw) => parse_datetime("manufacturing_date", raw)?,
            None => return_date,
        };

        let material_composition = self
            .material_composition
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ReturnRecord {
            sku: self.sku.clone(),
            product_name: self.product_name.clone(),
            category: self.category.clone(),
            condition: self.condition.clone(),
            return_reason: self.return_reason.clone(),
            original_price: self.original_price,
            customer_age: self.customer_age.unwrap_or(DEFAULT_CUSTOMER_AGE),
            purchase_channel: self
                .purchase_channel
                .clone()
                .unwrap_or_else(|| DEFAULT_PURCHASE_CHANNEL.to_string()),
            location: self.location.clone(),
            return_date,
            manufacturing_date,
            warranty_status: self
                .warranty_status
                .clone()
                .unwrap_or_else(|| DEFAULT_WARRANTY_STATUS.to_string()),
            material_composition,
            seasonality: self
                .seasonality
                .clone()
                .unwrap_or_else(|| DEFAULT_MARKET_LEVEL.to_string()),
            market_demand: self
                .market_demand
                .clone()
                .unwrap_or_else(|| DEFAULT_MARKET_LEVEL.to_string()),
        })
    }
}

/// Parses a timestamp in RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or
/// plain `YYYY-MM-DD` form.
pub fn parse_datetime(field: &str, raw: &str) -> Result<NaiveDateTime, ServiceError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight);
    }

    Err(ServiceError::invalid_field(
        field,
        format!("unrecognised date '{}'", raw),
    ))
}

/// Item condition grades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Condition {
    #[strum(serialize = "new")]
    New,
    #[strum(serialize = "lightly-used")]
    LightlyUsed,
    #[strum(serialize = "good")]
    Good,
    #[strum(serialize = "fair")]
    Fair,
    #[strum(serialize = "poor")]
    Poor,
    #[strum(serialize = "defective")]
    Defective,
}

/// Product categories with dedicated scoring. Matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
pub enum ProductCategory {
    Electronics,
    Appliances,
    Fashion,
    #[strum(serialize = "Home & Kitchen")]
    HomeAndKitchen,
    Books,
    Toys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum PurchaseChannel {
    #[strum(serialize = "online")]
    Online,
    #[strum(serialize = "mobile-app")]
    MobileApp,
    #[strum(serialize = "store")]
    Store,
}

/// Shared high/medium/low scale used for seasonality and market demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum MarketLevel {
    #[strum(serialize = "high")]
    High,
    #[strum(serialize = "medium")]
    Medium,
    #[strum(serialize = "low")]
    Low,
}

/// Downstream handling options for a returned item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Disposition {
    #[strum(serialize = "resale")]
    Resale,
    #[strum(serialize = "repair")]
    Repair,
    #[strum(serialize = "recycle")]
    Recycle,
    #[strum(serialize = "donate")]
    Donate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Timelike;

    fn row() -> ReturnRow {
        ReturnRow {
            sku: "SKU-1".into(),
            product_name: "Blender".into(),
            category: "Home & Kitchen".into(),
            condition: "good".into(),
            return_reason: "Changed mind".into(),
            original_price: 1200.0,
            customer_age: None,
            purchase_channel: None,
            location: "Pune".into(),
            return_date: "2024-03-15".into(),
            manufacturing_date: None,
            warranty_status: None,
            material_composition: Some("Plastic, Metal,".into()),
            seasonality: None,
            market_demand: Some("high".into()),
            actual_disposition: "resale".into(),
            value_recovered: Some(480.0),
        }
    }

    #[test]
    fn row_defaults_match_returns_feed() {
        let record = row().to_record().unwrap();
        assert_eq!(record.customer_age, 30);
        assert_eq!(record.purchase_channel, "online");
        assert_eq!(record.warranty_status, "expired");
        assert_eq!(record.seasonality, "medium");
        assert_eq!(record.market_demand, "high");
        assert_eq!(record.manufacturing_date, record.return_date);
        assert_eq!(record.material_composition, vec!["Plastic", "Metal"]);
    }

    #[test]
    fn malformed_dates_are_validation_errors() {
        let mut bad = row();
        bad.return_date = "15/03/2024".into();
        assert_matches!(bad.to_record(), Err(ServiceError::ValidationError(msg)) if msg.contains("return_date"));

        let mut bad_mfg = row();
        bad_mfg.manufacturing_date = Some("yesterday".into());
        assert_matches!(bad_mfg.to_record(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn parses_supported_date_formats() {
        let rfc = parse_datetime("d", "2024-01-02T03:04:05+00:00").unwrap();
        assert_eq!(rfc.hour(), 3);
        let spaced = parse_datetime("d", "2024-01-02 03:04:05").unwrap();
        assert_eq!(rfc, spaced);
        let date_only = parse_datetime("d", "2024-01-02").unwrap();
        assert_eq!(date_only.hour(), 0);
    }

    #[test]
    fn item_age_floors_partial_days() {
        let mut record = row().to_record().unwrap();
        record.manufacturing_date = parse_datetime("d", "2024-03-14 12:00:00").unwrap();
        assert_eq!(record.item_age_days(), 0);

        record.manufacturing_date = parse_datetime("d", "2024-03-15 12:00:00").unwrap();
        assert_eq!(record.item_age_days(), -1);
    }

    #[test]
    fn price_must_be_positive() {
        let mut record = row().to_record().unwrap();
        assert!(record.validate().is_ok());
        record.original_price = 0.0;
        assert!(record.validate().is_err());
        record.original_price = f64::NAN;
        assert!(record.validate().is_err());
    }

    #[test]
    fn vocabularies_parse_with_expected_case_rules() {
        assert_eq!("Lightly-Used".parse::<Condition>().ok(), Some(Condition::LightlyUsed));
        assert_eq!("MOBILE-APP".parse::<PurchaseChannel>().ok(), Some(PurchaseChannel::MobileApp));
        assert_eq!("Home & Kitchen".parse::<ProductCategory>().ok(), Some(ProductCategory::HomeAndKitchen));
        assert!("electronics".parse::<ProductCategory>().is_err());
        assert_eq!("Donate".parse::<Disposition>().ok(), Some(Disposition::Donate));
    }
}

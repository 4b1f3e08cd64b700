/*!
 * # Disposition Valuation
 *
 * Business heuristics that turn a return record and a chosen disposition into the
 * recovered value, environmental impact, processing estimate and sales channel.
 * Every function here is pure.
 */

use serde::{Deserialize, Serialize};

use super::round_decimal;
use crate::models::{Condition, Disposition, MarketLevel, ProductCategory, ReturnRecord};

pub const MARKETPLACE_FLIPKART: &str = "Flipkart";
pub const MARKETPLACE_FLIPKART_2GUD: &str = "Flipkart 2GUD";
pub const MARKETPLACE_MYNTRA: &str = "Myntra";
pub const MARKETPLACE_AMAZON_RENEWED: &str = "Amazon Renewed";
pub const MARKETPLACE_WALMART: &str = "Walmart Marketplace";

/// Derived metrics for one (record, action) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub estimated_value: f64,
    pub co2_saved: f64,
    pub landfill_avoided: f64,
    pub processing_time: u32,
    pub marketplace: Option<String>,
}

/// Computes every derived metric for `action` applied to `record`.
pub fn assess(record: &ReturnRecord, action: &str) -> Valuation {
    let estimated_value = estimated_value(record, action);
    Valuation {
        estimated_value,
        co2_saved: co2_saved(record, action),
        landfill_avoided: landfill_avoided(record, action),
        processing_time: processing_time(action, &record.category),
        marketplace: select_marketplace(action, &record.category, estimated_value)
            .map(str::to_string),
    }
}

/// Recovered currency value, rounded to 2 decimals.
pub fn estimated_value(record: &ReturnRecord, action: &str) -> f64 {
    let condition_factor = match record.condition.parse::<Condition>() {
        Ok(Condition::New) => 0.75,
        Ok(Condition::LightlyUsed) => 0.55,
        Ok(Condition::Good) => 0.40,
        Ok(Condition::Fair) => 0.25,
        Ok(Condition::Poor) => 0.10,
        Ok(Condition::Defective) => 0.05,
        Err(_) => 0.30,
    };
    let action_factor = match action.parse::<Disposition>() {
        Ok(Disposition::Resale) => 1.0,
        Ok(Disposition::Repair) => 0.6,
        Ok(Disposition::Recycle) => 0.05,
        Ok(Disposition::Donate) => 0.0,
        Err(_) => 0.30,
    };
    let demand_adjustment = match record.market_demand.parse::<MarketLevel>() {
        Ok(MarketLevel::High) => 1.2,
        Ok(MarketLevel::Medium) => 1.0,
        Ok(MarketLevel::Low) => 0.8,
        Err(_) => 1.0,
    };

    round2(record.original_price * condition_factor * action_factor * demand_adjustment)
}

/// Kilograms of CO2 avoided, rounded to 2 decimals.
pub fn co2_saved(record: &ReturnRecord, action: &str) -> f64 {
    let factor = match action.parse::<Disposition>() {
        Ok(Disposition::Resale) => 0.003,
        Ok(Disposition::Repair) => 0.002,
        Ok(Disposition::Recycle) => 0.001,
        Ok(Disposition::Donate) => 0.0025,
        Err(_) => 0.001,
    };
    round2(record.original_price * factor)
}

/// Kilograms kept out of landfill, rounded to 2 decimals.
pub fn landfill_avoided(record: &ReturnRecord, action: &str) -> f64 {
    let category_weight = match record.category.parse::<ProductCategory>() {
        Ok(ProductCategory::Electronics) => 0.8,
        Ok(ProductCategory::Appliances) => 2.5,
        Ok(ProductCategory::Fashion) => 0.3,
        Ok(ProductCategory::HomeAndKitchen) => 0.6,
        _ => 0.5,
    };
    let action_factor = match action.parse::<Disposition>() {
        Ok(Disposition::Resale) => 0.95,
        Ok(Disposition::Repair) => 0.85,
        Ok(Disposition::Recycle) => 0.60,
        Ok(Disposition::Donate) => 0.90,
        Err(_) => 0.5,
    };
    round2(category_weight * action_factor)
}

/// Processing estimate in whole days, never below 1.
///
/// Halves round to the nearest even day (6.5 -> 6, 7.5 -> 8).
pub fn processing_time(action: &str, category: &str) -> u32 {
    let base_days: f64 = match action.parse::<Disposition>() {
        Ok(Disposition::Resale) => 2.0,
        Ok(Disposition::Repair) => 5.0,
        Ok(Disposition::Recycle) => 1.0,
        Ok(Disposition::Donate) => 3.0,
        Err(_) => 3.0,
    };
    let multiplier = match category.parse::<ProductCategory>() {
        Ok(ProductCategory::Electronics) => 1.3,
        Ok(ProductCategory::Appliances) => 1.5,
        Ok(ProductCategory::Fashion) => 0.8,
        Ok(ProductCategory::HomeAndKitchen) => 1.0,
        _ => 1.0,
    };

    let days = (base_days * multiplier).round_ties_even();
    (days as u32).max(1)
}

/// Sales channel for resale items; `None` for every other action.
pub fn select_marketplace(action: &str, category: &str, value: f64) -> Option<&'static str> {
    if !matches!(action.parse::<Disposition>(), Ok(Disposition::Resale)) {
        return None;
    }

    let marketplace = if value > 10_000.0 {
        MARKETPLACE_FLIPKART
    } else if value > 2_000.0 {
        MARKETPLACE_FLIPKART_2GUD
    } else if category == "Fashion" {
        MARKETPLACE_MYNTRA
    } else if category == "Electronics" {
        MARKETPLACE_AMAZON_RENEWED
    } else {
        MARKETPLACE_WALMART
    };
    Some(marketplace)
}

/// Human-readable justification for a recommendation.
pub fn reasoning(record: &ReturnRecord, action: &str, confidence: f64) -> String {
    let descriptor = match record.condition.parse::<Condition>() {
        Ok(Condition::New) => "excellent",
        Ok(Condition::LightlyUsed) => "very good",
        Ok(Condition::Good) => "good",
        Ok(Condition::Fair) => "acceptable",
        Ok(Condition::Poor) => "poor",
        Ok(Condition::Defective) => "defective",
        Err(_) => "unknown",
    };
    let base = format!("Item in {} condition", descriptor);

    // Clauses key off the exact label the classifier emitted
    match action {
        "resale" => format!(
            "{}, suitable for resale market. {} has good demand.",
            base, record.category
        ),
        "repair" => format!("{}, economically viable for repair and resale.", base),
        "recycle" => format!(
            "{}, beyond economical repair. Materials can be responsibly recycled.",
            base
        ),
        "donate" => format!("{}, has social value for donation programs.", base),
        _ => format!("{}. Confidence: {:.1}%", base, confidence * 100.0),
    }
}

fn round2(value: f64) -> f64 {
    round_decimal(value, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_datetime;
    use rstest::rstest;

    fn item(category: &str, condition: &str, price: f64, demand: &str) -> ReturnRecord {
        ReturnRecord {
            sku: "SKU-9".into(),
            product_name: "Item".into(),
            category: category.into(),
            condition: condition.into(),
            return_reason: "Wrong size".into(),
            original_price: price,
            customer_age: 35,
            purchase_channel: "store".into(),
            location: "Delhi".into(),
            return_date: parse_datetime("d", "2024-02-01").unwrap(),
            manufacturing_date: parse_datetime("d", "2023-08-01").unwrap(),
            warranty_status: "expired".into(),
            material_composition: vec![],
            seasonality: "low".into(),
            market_demand: demand.into(),
        }
    }

    #[test]
    fn estimated_value_applies_all_multipliers() {
        let record = item("Electronics", "lightly-used", 2500.0, "high");
        assert_eq!(estimated_value(&record, "resale"), 1650.0);
        assert_eq!(estimated_value(&record, "repair"), 990.0);
        assert_eq!(estimated_value(&record, "recycle"), 82.5);
        assert_eq!(estimated_value(&record, "donate"), 0.0);
        assert_eq!(estimated_value(&record, "liquidate"), 495.0);
    }

    #[test]
    fn unknown_condition_and_demand_use_defaults() {
        let record = item("Toys", "mint", 1000.0, "volatile");
        assert_eq!(estimated_value(&record, "resale"), 300.0);
    }

    #[test]
    fn action_lookup_is_case_insensitive() {
        let record = item("Fashion", "new", 1000.0, "low");
        assert_eq!(estimated_value(&record, "RESALE"), 600.0);
    }

    #[test]
    fn co2_factors() {
        let record = item("Fashion", "good", 1000.0, "medium");
        assert_eq!(co2_saved(&record, "resale"), 3.0);
        assert_eq!(co2_saved(&record, "repair"), 2.0);
        assert_eq!(co2_saved(&record, "recycle"), 1.0);
        assert_eq!(co2_saved(&record, "donate"), 2.5);
        assert_eq!(co2_saved(&record, "other"), 1.0);
    }

    #[rstest]
    #[case("Electronics", "resale", 0.76)]
    #[case("Appliances", "repair", 2.12)]
    #[case("Fashion", "recycle", 0.18)]
    #[case("Home & Kitchen", "donate", 0.54)]
    #[case("Books", "resale", 0.47)]
    #[case("Electronics", "other", 0.4)]
    fn landfill_weights(#[case] category: &str, #[case] action: &str, #[case] expected: f64) {
        let record = item(category, "good", 100.0, "medium");
        assert_eq!(landfill_avoided(&record, action), expected);
    }

    #[rstest]
    #[case("resale", "Electronics", 3)]
    #[case("repair", "Electronics", 6)]
    #[case("recycle", "Electronics", 1)]
    #[case("donate", "Electronics", 4)]
    #[case("repair", "Appliances", 8)]
    #[case("recycle", "Appliances", 2)]
    #[case("donate", "Appliances", 4)]
    #[case("recycle", "Fashion", 1)]
    #[case("donate", "Fashion", 2)]
    #[case("repair", "Books", 5)]
    #[case("unknown", "Books", 3)]
    fn processing_days(#[case] action: &str, #[case] category: &str, #[case] expected: u32) {
        assert_eq!(processing_time(action, category), expected);
    }

    #[test]
    fn marketplace_priority_order() {
        assert_eq!(select_marketplace("resale", "Books", 10_000.01), Some("Flipkart"));
        assert_eq!(select_marketplace("resale", "Fashion", 10_000.0), Some("Flipkart 2GUD"));
        assert_eq!(select_marketplace("resale", "Fashion", 2_000.0), Some("Myntra"));
        assert_eq!(select_marketplace("resale", "Electronics", 150.0), Some("Amazon Renewed"));
        assert_eq!(select_marketplace("resale", "Toys", 150.0), Some("Walmart Marketplace"));
        assert_eq!(select_marketplace("repair", "Electronics", 50_000.0), None);
        assert_eq!(select_marketplace("donate", "Fashion", 10.0), None);
    }

    #[test]
    fn assess_high_value_electronics_goes_to_flipkart() {
        let record = item("Electronics", "new", 15_000.0, "high");
        let valuation = assess(&record, "resale");
        assert_eq!(valuation.estimated_value, 13_500.0);
        assert_eq!(valuation.marketplace.as_deref(), Some("Flipkart"));
        assert_eq!(valuation.co2_saved, 45.0);
        assert_eq!(valuation.processing_time, 3);
    }

    #[test]
    fn assess_low_value_fashion_goes_to_myntra() {
        let record = item("Fashion", "good", 1_500.0, "medium");
        let valuation = assess(&record, "resale");
        assert_eq!(valuation.estimated_value, 600.0);
        assert_eq!(valuation.marketplace.as_deref(), Some("Myntra"));
    }

    #[test]
    fn reasoning_templates() {
        let record = item("Electronics", "lightly-used", 100.0, "high");
        assert_eq!(
            reasoning(&record, "resale", 0.9),
            "Item in very good condition, suitable for resale market. Electronics has good demand."
        );
        assert_eq!(
            reasoning(&record, "repair", 0.9),
            "Item in very good condition, economically viable for repair and resale."
        );
        assert_eq!(
            reasoning(&record, "recycle", 0.9),
            "Item in very good condition, beyond economical repair. Materials can be responsibly recycled."
        );
        assert_eq!(
            reasoning(&record, "donate", 0.9),
            "Item in very good condition, has social value for donation programs."
        );

        let unknown = item("Electronics", "battered", 100.0, "high");
        assert_eq!(
            reasoning(&unknown, "liquidate", 0.875),
            "Item in unknown condition. Confidence: 87.5%"
        );
    }
}

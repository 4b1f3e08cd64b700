/*!
 * # Feature Encoding
 *
 * Deterministic mapping from a [`ReturnRecord`] to the fixed numeric schema consumed
 * by the disposition classifier. Encoding never touches model state, so the same
 * record always yields the same vector.
 */

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Condition, MarketLevel, ProductCategory, PurchaseChannel, ReturnRecord};

/// Version tag persisted alongside fitted models that consume this schema.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Number of features in the schema
pub const FEATURE_COUNT: usize = 20;

/// Feature names in column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "original_price",
    "customer_age",
    "condition_score",
    "category_encoded",
    "channel_encoded",
    "item_age_days",
    "return_month",
    "return_quarter",
    "is_weekend",
    "price_category",
    "price_per_age",
    "seasonality_score",
    "demand_score",
    "warranty_active",
    "material_count",
    "has_electronics",
    "has_plastic",
    "has_metal",
    "reason_length",
    "reason_sentiment",
];

const NEGATIVE_REASON_WORDS: [&str; 7] = [
    "defective", "broken", "damaged", "poor", "bad", "terrible", "awful",
];
const NEUTRAL_REASON_WORDS: [&str; 5] = ["size", "color", "changed mind", "duplicate", "wrong"];

/// Encoded features for one record, in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Looks up a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|idx| self.values[idx])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    /// Iterates `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Encodes a return record into its feature vector.
pub fn encode(record: &ReturnRecord) -> FeatureVector {
    let item_age_days = record.item_age_days();
    if item_age_days < 0 {
        warn!(
            sku = %record.sku,
            item_age_days,
            "manufacturing date is after return date; passing negative age through"
        );
    }
    let item_age = item_age_days as f64;
    let return_date = record.return_date;
    let month = return_date.month();
    let tags = &record.material_composition;

    FeatureVector {
        values: [
            record.original_price,
            f64::from(record.customer_age),
            condition_score(&record.condition),
            category_score(&record.category),
            channel_score(&record.purchase_channel),
            item_age,
            f64::from(month),
            f64::from(quarter(month)),
            flag(is_weekend(&return_date)),
            price_category(record.original_price),
            record.original_price / item_age.max(1.0),
            market_level_score(&record.seasonality),
            market_level_score(&record.market_demand),
            // Exact, case-sensitive match: "Active" does not count as active
            flag(record.warranty_status == "active"),
            tags.len() as f64,
            flag(has_tag(tags, "Electronics")),
            flag(has_tag(tags, "Plastic")),
            flag(has_tag(tags, "Metal")),
            record.return_reason.chars().count() as f64,
            reason_sentiment(&record.return_reason),
        ],
    }
}

/// Condition score in [0, 1]; unknown conditions score 0.5.
pub fn condition_score(condition: &str) -> f64 {
    match condition.parse::<Condition>() {
        Ok(Condition::New) => 1.0,
        Ok(Condition::LightlyUsed) => 0.8,
        Ok(Condition::Good) => 0.6,
        Ok(Condition::Fair) => 0.4,
        Ok(Condition::Poor) => 0.2,
        Ok(Condition::Defective) => 0.0,
        Err(_) => 0.5,
    }
}

pub fn category_score(category: &str) -> f64 {
    match category.parse::<ProductCategory>() {
        Ok(ProductCategory::Electronics) => 0.9,
        Ok(ProductCategory::Appliances) => 0.8,
        Ok(ProductCategory::Fashion) => 0.6,
        Ok(ProductCategory::HomeAndKitchen) => 0.5,
        Ok(ProductCategory::Books) => 0.3,
        Ok(ProductCategory::Toys) => 0.4,
        Err(_) => 0.5,
    }
}

pub fn channel_score(channel: &str) -> f64 {
    match channel.parse::<PurchaseChannel>() {
        Ok(PurchaseChannel::Online) => 0.8,
        Ok(PurchaseChannel::MobileApp) => 0.9,
        Ok(PurchaseChannel::Store) => 0.6,
        Err(_) => 0.7,
    }
}

/// Score for seasonality and market demand levels
pub fn market_level_score(level: &str) -> f64 {
    match level.parse::<MarketLevel>() {
        Ok(MarketLevel::High) => 1.0,
        Ok(MarketLevel::Medium) => 0.6,
        Ok(MarketLevel::Low) => 0.3,
        Err(_) => 0.6,
    }
}

pub fn price_category(price: f64) -> f64 {
    if price < 500.0 {
        0.2
    } else if price < 2_000.0 {
        0.4
    } else if price < 10_000.0 {
        0.6
    } else if price < 50_000.0 {
        0.8
    } else {
        1.0
    }
}

/// Lexicon sentiment of a return reason. Negative words win over neutral ones.
pub fn reason_sentiment(reason: &str) -> f64 {
    let lowered = reason.to_lowercase();
    if NEGATIVE_REASON_WORDS.iter().any(|word| lowered.contains(word)) {
        0.2
    } else if NEUTRAL_REASON_WORDS.iter().any(|word| lowered.contains(word)) {
        0.6
    } else {
        0.8
    }
}

/// Calendar quarter, 1-indexed
pub fn quarter(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

fn is_weekend(date: &NaiveDateTime) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

fn has_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|candidate| candidate == tag)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

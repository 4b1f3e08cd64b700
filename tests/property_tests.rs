//! Property-based tests for the valuation, encoding and scoring rules.
//!
//! These cover every disposition and condition grade over a wide range of prices
//! and ratios, including unknown categorical values.

mod common;

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use smartreturns_engine::{
    ml::{
        features::{condition_score, encode, FEATURE_COUNT},
        risk::{RiskInputs, RiskLevel, RiskScorer},
        valuation,
    },
    models::ReturnRecord,
    PredictionEngine,
};

/// Trained once and shared by every generated case.
fn shared_engine() -> &'static PredictionEngine {
    static ENGINE: OnceLock<PredictionEngine> = OnceLock::new();
    ENGINE.get_or_init(common::trained_engine)
}

fn condition_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("new".to_string()),
        Just("lightly-used".to_string()),
        Just("good".to_string()),
        Just("fair".to_string()),
        Just("poor".to_string()),
        Just("defective".to_string()),
        "[a-z]{1,12}",
    ]
}

fn category_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Electronics".to_string()),
        Just("Fashion".to_string()),
        Just("Home".to_string()),
        Just("Books".to_string()),
        Just("Sports".to_string()),
        Just("Appliances".to_string()),
        "[A-Z][a-z]{2,10}",
    ]
}

fn action_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("resale".to_string()),
        Just("repair".to_string()),
        Just("recycle".to_string()),
        Just("donate".to_string()),
        Just("liquidate".to_string()),
    ]
}

fn price_strategy() -> impl Strategy<Value = f64> {
    0.01f64..500_000.0
}

fn ratio_strategy() -> impl Strategy<Value = f64> {
    0.0f64..5.0
}

fn datetime_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (-1_500i64..1_500, 0i64..86_400).prop_map(|(days, seconds)| {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(days)
            + Duration::seconds(seconds)
    })
}

prop_compose! {
    fn record_strategy()(
        sku in "[A-Z0-9-]{1,20}",
        category in category_strategy(),
        condition in condition_strategy(),
        return_reason in ".{0,40}",
        original_price in price_strategy(),
        customer_age in 0u32..120,
        purchase_channel in prop_oneof![Just("online".to_string()), Just("store".to_string()), "[a-z]{0,8}"],
        location in "[A-Za-z ]{0,16}",
        return_date in datetime_strategy(),
        // independent of return_date, so it is regularly the later of the two
        manufacturing_date in datetime_strategy(),
        warranty_status in prop_oneof![Just("active".to_string()), Just("expired".to_string()), "[a-z]{0,8}"],
        material_composition in prop::collection::vec("[A-Za-z]{0,10}", 0..4),
        seasonality in prop_oneof![Just("high".to_string()), Just("low".to_string()), "[a-z]{0,8}"],
        market_demand in prop_oneof![Just("high".to_string()), Just("medium".to_string()), "[a-z]{0,8}"],
    ) -> ReturnRecord {
        ReturnRecord {
            sku,
            product_name: format!("{} item", category),
            category,
            condition,
            return_reason,
            original_price,
            customer_age,
            purchase_channel,
            location,
            return_date,
            manufacturing_date,
            warranty_status,
            material_composition,
            seasonality,
            market_demand,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn estimated_value_is_never_negative(
        condition in condition_strategy(),
        category in category_strategy(),
        action in action_strategy(),
        price in price_strategy(),
    ) {
        let record = common::record(&condition, &category, price);
        prop_assert!(valuation::estimated_value(&record, &action) >= 0.0);
    }

    #[test]
    fn donated_items_recover_nothing(
        condition in condition_strategy(),
        category in category_strategy(),
        price in price_strategy(),
    ) {
        let record = common::record(&condition, &category, price);
        prop_assert_eq!(valuation::estimated_value(&record, "donate"), 0.0);
    }

    #[test]
    fn marketplace_only_for_resale(
        action in action_strategy(),
        category in category_strategy(),
        value in 0.0f64..50_000.0,
    ) {
        let marketplace = valuation::select_marketplace(&action, &category, value);
        prop_assert_eq!(marketplace.is_some(), action == "resale");
    }

    #[test]
    fn condition_score_is_total_and_bounded(condition in ".{0,20}") {
        let score = condition_score(&condition);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn encoding_is_finite_and_fixed_width(
        condition in condition_strategy(),
        category in category_strategy(),
        price in price_strategy(),
    ) {
        let features = encode(&common::record(&condition, &category, price)).to_vec();
        prop_assert_eq!(features.len(), FEATURE_COUNT);
        prop_assert!(features.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn risk_scores_stay_in_bounds(
        return_rate in ratio_strategy(),
        value_recovery_rate in ratio_strategy(),
        defect_rate in ratio_strategy(),
        demand_volatility in ratio_strategy(),
        avg_processing_time in 0.0f64..60.0,
    ) {
        let assessment = RiskScorer::new()
            .assess(&RiskInputs {
                return_rate,
                value_recovery_rate,
                defect_rate,
                demand_volatility,
                avg_processing_time,
            })
            .unwrap();

        prop_assert!((0.0..=100.0).contains(&assessment.overall_score));
        prop_assert!(assessment
            .component_scores
            .values()
            .all(|score| (0.0..=100.0).contains(score)));
        if assessment.risk_level == RiskLevel::Critical {
            prop_assert!(!assessment.recommendations.is_empty());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn trained_engine_predicts_any_well_formed_record(record in record_strategy()) {
        let prediction = shared_engine().predict_disposition(&record);
        prop_assert!(prediction.is_ok(), "prediction failed: {:?}", prediction);
        let prediction = prediction.unwrap();

        prop_assert!(["resale", "recycle"].contains(&prediction.recommended_action.as_str()));
        prop_assert!((0.0..=1.0).contains(&prediction.confidence));
        prop_assert!(prediction.estimated_value >= 0.0);
        prop_assert!(prediction.estimated_value.is_finite());
    }
}

#[test]
fn unknown_condition_scores_exactly_half() {
    assert_eq!(condition_score("gently-loved"), 0.5);
    assert_eq!(condition_score(""), 0.5);
}

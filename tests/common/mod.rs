#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use smartreturns_engine::{
    config::EngineConfig,
    models::{
        parse_datetime, ReturnCountRow, ReturnRecord, ReturnRow, TimeSeriesRow, TrainingDatasets,
    },
    PredictionEngine,
};

/// Engine with small ensembles so integration tests stay quick.
pub fn test_engine() -> PredictionEngine {
    PredictionEngine::new(&test_config()).expect("default test config is valid")
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.disposition.n_estimators = 15;
    config.forecasting.n_estimators = 30;
    config
}

pub fn record(condition: &str, category: &str, price: f64) -> ReturnRecord {
    let damaged = condition == "defective";
    ReturnRecord {
        sku: format!("SKU-{}-{}", category, price),
        product_name: format!("{} item", category),
        category: category.to_string(),
        condition: condition.to_string(),
        return_reason: if damaged {
            "Stopped working after a week".into()
        } else {
            "Ordered the wrong size".into()
        },
        original_price: price,
        customer_age: 34,
        purchase_channel: if damaged { "store".into() } else { "online".into() },
        location: "Bengaluru".into(),
        return_date: parse_datetime("return_date", "2024-06-01 12:00:00").unwrap(),
        manufacturing_date: parse_datetime("manufacturing_date", "2023-12-01").unwrap(),
        warranty_status: if damaged { "expired".into() } else { "active".into() },
        material_composition: vec!["Plastic".into(), "Metal".into()],
        seasonality: "medium".into(),
        market_demand: if damaged { "low".into() } else { "high".into() },
    }
}

fn row(condition: &str, price: f64, disposition: &str, index: usize) -> ReturnRow {
    let damaged = condition == "defective";
    ReturnRow {
        sku: format!("ROW-{:03}", index),
        product_name: "Bluetooth speaker".into(),
        category: "Electronics".into(),
        condition: condition.into(),
        return_reason: if damaged {
            "Stopped working after a week".into()
        } else {
            "Ordered the wrong size".into()
        },
        original_price: price,
        customer_age: Some(28 + (index % 10) as u32),
        purchase_channel: Some(if damaged { "store".into() } else { "online".into() }),
        location: "Bengaluru".into(),
        return_date: "2024-05-15".into(),
        manufacturing_date: Some("2023-10-01".into()),
        warranty_status: Some(if damaged { "expired".into() } else { "active".into() }),
        material_composition: Some("Plastic, Electronics".into()),
        seasonality: None,
        market_demand: Some(if damaged { "low".into() } else { "high".into() }),
        actual_disposition: disposition.into(),
        value_recovered: None,
    }
}

/// Two clearly separated populations: new expensive items resold, cheap defective
/// items recycled.
pub fn return_rows() -> Vec<ReturnRow> {
    let mut rows = Vec::new();
    for i in 0..15 {
        rows.push(row("new", 6_000.0 + i as f64 * 400.0, "resale", rows.len()));
        rows.push(row("defective", 250.0 + i as f64 * 40.0, "recycle", rows.len()));
    }
    rows
}

/// Monthly recovered value with an upward drift.
pub fn time_series() -> Vec<TimeSeriesRow> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    (0..24)
        .map(|i| TimeSeriesRow {
            date: start + Duration::days(30 * i),
            value_recovered: 10_000.0 + 250.0 * i as f64 + if i % 12 < 3 { 1_500.0 } else { 0.0 },
            category_encoded: Some(0.9),
            avg_price: Some(4_000.0 + 10.0 * i as f64),
            volume: Some(80.0 + (i % 5) as f64),
            seasonality_score: Some(0.5),
        })
        .collect()
}

/// Sixty days of per-category counts with mild variation.
pub fn history() -> Vec<ReturnCountRow> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut rows = Vec::new();
    for day in 0..60 {
        let date = start + Duration::days(day);
        rows.push(ReturnCountRow {
            date,
            category: "Electronics".into(),
            count: 20 + (day % 4) as u64,
        });
        rows.push(ReturnCountRow {
            date,
            category: "Fashion".into(),
            count: 10 + (day % 3) as u64,
        });
    }
    rows
}

pub fn training_datasets() -> TrainingDatasets {
    TrainingDatasets {
        returns: Some(return_rows()),
        time_series: Some(time_series()),
        historical: Some(history()),
    }
}

pub fn trained_engine() -> PredictionEngine {
    let mut engine = test_engine();
    engine
        .train_models(&training_datasets())
        .expect("fixture datasets train cleanly");
    engine
}

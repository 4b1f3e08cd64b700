mod common;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, Utc};
use smartreturns_engine::{
    ml::{
        anomaly_detection::{AnomalyKind, Severity},
        risk::{RiskInputs, RiskLevel},
        routing_model::HubCapacity,
    },
    models::{ReturnCountRow, ReturnOutcome, TimeSeriesRow, TrainingDatasets},
    PredictionEngine, ServiceError,
};
use tempfile::TempDir;

use common::{record, return_rows, test_engine, time_series, trained_engine, training_datasets};

#[test]
fn training_reports_every_component() {
    let mut engine = test_engine();
    let report = engine.train_models(&training_datasets()).unwrap();

    let disposition = report.disposition.expect("returns dataset was supplied");
    assert_eq!(disposition.classes, vec!["recycle", "resale"]);
    assert_eq!(disposition.n_train + disposition.n_test, 30);
    assert!((0.0..=1.0).contains(&disposition.accuracy));

    let forecasting = report.forecasting.expect("time series was supplied");
    assert_eq!(forecasting.n_train, 19);
    assert_eq!(forecasting.n_test, 5);
    assert!(forecasting.mae >= 0.0);

    let baseline = report.anomaly_detection.expect("history was supplied");
    assert!(baseline.daily_std > 0.0);
    assert_eq!(baseline.category_means.len(), 2);

    let status = engine.model_status();
    assert!(status.disposition.trained);
    assert!(status.forecasting.trained);
    assert!(status.anomaly_detection.trained);
    assert_eq!(status.last_trained_at, Some(report.trained_at));
}

#[test]
fn trained_engine_recommends_dispositions() {
    let engine = trained_engine();

    let resale = engine
        .predict_disposition(&record("new", "Electronics", 16_000.0))
        .unwrap();
    assert_eq!(resale.recommended_action, "resale");
    assert_eq!(resale.marketplace.as_deref(), Some("Flipkart"));
    assert_eq!(resale.estimated_value, 14_400.0);
    assert!(resale.confidence > 0.5 && resale.confidence <= 1.0);

    let recycle = engine
        .predict_disposition(&record("defective", "Electronics", 400.0))
        .unwrap();
    assert_eq!(recycle.recommended_action, "recycle");
    assert_eq!(recycle.marketplace, None);
    assert!(recycle.estimated_value >= 0.0);
}

#[test]
fn predictions_before_training_are_not_trained() {
    let engine = test_engine();
    assert_matches!(
        engine.predict_disposition(&record("new", "Electronics", 900.0)),
        Err(ServiceError::NotTrained(_))
    );
    assert_matches!(engine.forecast_demand(6, None), Err(ServiceError::NotTrained(_)));
    assert_matches!(engine.detect_anomalies(&[]), Err(ServiceError::NotTrained(_)));
}

#[test]
fn invalid_records_are_rejected() {
    let engine = trained_engine();
    let mut bad = record("new", "Electronics", 900.0);
    bad.original_price = 0.0;
    assert_matches!(engine.predict_disposition(&bad), Err(ServiceError::ValidationError(_)));
}

#[test]
fn batch_prediction_is_bounded_and_all_or_nothing() {
    let engine = trained_engine();

    let records = vec![
        record("new", "Electronics", 12_000.0),
        record("defective", "Electronics", 300.0),
    ];
    assert_eq!(engine.predict_batch(&records).unwrap().len(), 2);

    let too_many: Vec<_> = (0..101)
        .map(|i| record("good", "Electronics", 1_000.0 + i as f64))
        .collect();
    assert_matches!(engine.predict_batch(&too_many), Err(ServiceError::ValidationError(_)));

    let mut with_invalid = records.clone();
    with_invalid[1].original_price = -5.0;
    assert_matches!(engine.predict_batch(&with_invalid), Err(ServiceError::ValidationError(_)));
}

#[test]
fn forecast_has_ordered_bounded_periods() {
    let engine = trained_engine();
    let forecast = engine.forecast_demand(6, None).unwrap();

    assert_eq!(forecast.predictions.len(), 6);
    let today = Utc::now().date_naive();
    for (i, point) in forecast.predictions.iter().enumerate() {
        assert_eq!(point.period, i as u32 + 1);
        assert!(point.lower_bound <= point.predicted_value);
        assert!(point.predicted_value <= point.upper_bound);
        // the first period is dated today, unless the clock ticked past midnight
        let offset = (point.date - today).num_days();
        assert!(offset == 30 * i as i64 || offset == 30 * i as i64 - 1);
    }
    assert!((0.0..=1.0).contains(&forecast.seasonality_factor));

    assert_matches!(engine.forecast_demand(0, None), Err(ServiceError::ValidationError(_)));
    assert_matches!(engine.forecast_demand(25, None), Err(ServiceError::ValidationError(_)));
    assert!(engine.forecast_demand(24, Some("Fashion")).is_ok());
}

#[test]
fn anomalies_flag_spikes_only() {
    let engine = trained_engine();
    let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

    let normal = vec![
        ReturnCountRow { date, category: "Electronics".into(), count: 21 },
        ReturnCountRow { date, category: "Fashion".into(), count: 11 },
    ];
    assert!(engine.detect_anomalies(&normal).unwrap().is_empty());

    let spike = vec![
        ReturnCountRow { date, category: "Electronics".into(), count: 80 },
        ReturnCountRow { date, category: "Fashion".into(), count: 10 },
    ];
    let anomalies = engine.detect_anomalies(&spike).unwrap();
    assert_eq!(anomalies.len(), 2);
    assert_eq!(anomalies[0].kind, AnomalyKind::Volume);
    assert_eq!(anomalies[0].severity, Severity::High);
    assert_eq!(anomalies[1].kind, AnomalyKind::Category);
    assert_eq!(anomalies[1].key, "Electronics");
    assert!(anomalies[1].description.starts_with("Unusual Electronics returns: 80 vs expected"));
}

#[test]
fn zero_variance_history_yields_no_volume_anomalies() {
    let mut engine = test_engine();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let flat: Vec<ReturnCountRow> = (0..10)
        .map(|day| ReturnCountRow {
            date: start + Duration::days(day),
            category: "Toys".into(),
            count: 5,
        })
        .collect();
    engine
        .train_models(&TrainingDatasets {
            historical: Some(flat),
            ..TrainingDatasets::default()
        })
        .unwrap();

    let current = vec![ReturnCountRow {
        date: start + Duration::days(30),
        category: "Toys".into(),
        count: 500,
    }];
    let anomalies = engine.detect_anomalies(&current).unwrap();
    assert!(anomalies.iter().all(|a| a.kind != AnomalyKind::Volume));
}

#[test]
fn save_then_load_reproduces_predictions() {
    let engine = trained_engine();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("models.json");
    engine.save_models(&path).unwrap();

    let mut restored = test_engine();
    restored.load_models(&path).unwrap();

    for probe in [
        record("new", "Electronics", 16_000.0),
        record("defective", "Electronics", 400.0),
        record("fair", "Fashion", 1_500.0),
    ] {
        assert_eq!(
            engine.predict_disposition(&probe).unwrap(),
            restored.predict_disposition(&probe).unwrap()
        );
    }
    assert_eq!(
        engine.forecast_demand(3, Some("Books")).unwrap(),
        restored.forecast_demand(3, Some("Books")).unwrap()
    );
    assert_eq!(engine.model_status(), restored.model_status());
}

#[test]
fn status_reports_the_loaded_model_algorithm() {
    let engine = trained_engine();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("models.json");
    engine.save_models(&path).unwrap();

    let mut config = common::test_config();
    config.disposition.algorithm = "decision_tree".into();
    config.forecasting.algorithm = "decision_tree".into();
    let mut restored = PredictionEngine::new(&config).unwrap();
    assert_eq!(restored.model_status().disposition.algorithm, "decision_tree");

    restored.load_models(&path).unwrap();
    let status = restored.model_status();
    assert_eq!(status.disposition.algorithm, "random_forest");
    assert_eq!(status.forecasting.algorithm, "gradient_boosting");
}

#[test]
fn loading_a_corrupt_file_keeps_current_state() {
    let mut engine = trained_engine();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert_matches!(engine.load_models(&path), Err(ServiceError::SerializationError(_)));
    assert_matches!(
        engine.load_models(dir.path().join("missing.json")),
        Err(ServiceError::IoError(_))
    );
    assert!(engine.model_status().disposition.trained);
}

#[test]
fn failed_training_commits_nothing() {
    let mut engine = test_engine();
    let short_series: Vec<TimeSeriesRow> = time_series().into_iter().take(3).collect();
    let result = engine.train_models(&TrainingDatasets {
        returns: Some(return_rows()),
        time_series: Some(short_series),
        historical: None,
    });
    assert_matches!(result, Err(ServiceError::InsufficientData(_)));

    let status = engine.model_status();
    assert!(!status.disposition.trained);
    assert!(status.last_trained_at.is_none());
}

#[test]
fn malformed_training_dates_are_validation_errors() {
    let mut engine = test_engine();
    let mut rows = return_rows();
    rows[3].return_date = "15/05/2024".into();
    assert_matches!(
        engine.train_models(&TrainingDatasets {
            returns: Some(rows),
            ..TrainingDatasets::default()
        }),
        Err(ServiceError::ValidationError(_))
    );
}

#[test]
fn reference_risk_profile_is_medium() {
    let engine = test_engine();
    let assessment = engine
        .assess_risk(&RiskInputs {
            return_rate: 0.12,
            value_recovery_rate: 0.65,
            defect_rate: 0.08,
            demand_volatility: 0.25,
            avg_processing_time: 3.5,
        })
        .unwrap();
    assert_eq!(assessment.overall_score, 57.5);
    assert_eq!(assessment.risk_level, RiskLevel::Medium);
}

#[test]
fn insights_and_hub_assignment_need_no_training() {
    let engine = test_engine();

    let outcomes = vec![
        ReturnOutcome {
            category: Some("Books".into()),
            value_recovered: Some(12.0),
            ..ReturnOutcome::default()
        },
        ReturnOutcome {
            category: Some("Electronics".into()),
            value_recovered: Some(800.0),
            ..ReturnOutcome::default()
        },
    ];
    let insights = engine.generate_insights(&outcomes);
    assert_eq!(insights.total_items, 2);
    assert_eq!(insights.avg_value, 406.0);

    let items = vec![
        record("good", "Books", 300.0),
        record("new", "Electronics", 9_000.0),
        record("fair", "Fashion", 700.0),
    ];
    let hubs = vec![
        HubCapacity { hub_id: "delhi".into(), capacity: 10 },
        HubCapacity { hub_id: "pune".into(), capacity: 9 },
    ];
    let allocations = engine.optimize_hub_assignment(&items, &hubs).unwrap();
    assert_eq!(allocations[0].hub_id, "delhi");
    assert_eq!(allocations[0].skus.len(), 3);
    assert!(allocations[1].skus.is_empty());

    assert_matches!(
        engine.optimize_hub_assignment(&items, &[]),
        Err(ServiceError::ValidationError(_))
    );
}

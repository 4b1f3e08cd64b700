/*!
 * # Prediction Engine
 *
 * Owns one instance of every engine component and exposes the operations callers
 * use: training from tabular datasets, single and batch disposition predictions,
 * demand forecasts, anomaly detection, risk assessment, insights, hub assignment,
 * status reporting and JSON persistence of the fitted state.
 *
 * Training takes `&mut self` and every query takes `&self`, so a shared engine
 * must be wrapped in a lock by the caller.
 */

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::anomaly_detection::{AnomalyBaseline, AnomalyDetector, AnomalyRecord};
use super::disposition::{ClassificationMetrics, DispositionPolicy, PredictionResult, TrainedDisposition};
use super::features::{FEATURE_NAMES, FEATURE_SCHEMA_VERSION};
use super::forecasting::{DemandForecaster, ForecastResult, RegressionMetrics, TrainedForecaster};
use super::insights::{generate_insights, Insights};
use super::risk::{RiskAssessment, RiskInputs, RiskScorer};
use super::routing_model::{HubAllocation, HubCapacity, HubRoutingModel};
use crate::config::EngineConfig;
use crate::errors::{PersistenceError, ResultExt, ServiceError};
use crate::models::{ReturnCountRow, ReturnOutcome, ReturnRecord, TrainingDatasets};

/// Bumped whenever the snapshot layout changes
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Method name reported for the anomaly detector
const ANOMALY_METHOD: &str = "z_score";

/// Metrics from one `train_models` call. Components whose dataset was absent are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub disposition: Option<ClassificationMetrics>,
    pub forecasting: Option<RegressionMetrics>,
    pub anomaly_detection: Option<AnomalyBaseline>,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub trained: bool,
    pub algorithm: String,
    pub metrics: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub disposition: ComponentStatus,
    pub forecasting: ComponentStatus,
    pub anomaly_detection: ComponentStatus,
    pub last_trained_at: Option<DateTime<Utc>>,
}

/// On-disk form of the fitted engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub format_version: u32,
    pub feature_schema_version: u32,
    pub feature_names: Vec<String>,
    pub saved_at: DateTime<Utc>,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub disposition: Option<TrainedDisposition>,
    pub forecasting: Option<TrainedForecaster>,
    pub anomaly_detection: Option<AnomalyBaseline>,
}

#[derive(Debug, Clone)]
pub struct PredictionEngine {
    disposition: DispositionPolicy,
    forecaster: DemandForecaster,
    anomaly_detector: AnomalyDetector,
    risk_scorer: RiskScorer,
    hub_router: HubRoutingModel,
    max_batch_size: usize,
    last_trained_at: Option<DateTime<Utc>>,
}

impl PredictionEngine {
    /// Builds an untrained engine.
    ///
    /// Unknown algorithm names fail with `UnsupportedAlgorithm`; any other invalid
    /// setting fails with `ValidationError`.
    pub fn new(config: &EngineConfig) -> Result<Self, ServiceError> {
        let disposition = DispositionPolicy::new((&config.disposition).into())?;
        let forecaster = DemandForecaster::new((&config.forecasting).into())?;
        config.validate()?;

        Ok(Self {
            disposition,
            forecaster,
            anomaly_detector: AnomalyDetector::new((&config.anomaly).into()),
            risk_scorer: RiskScorer::new(),
            hub_router: HubRoutingModel::new(),
            max_batch_size: config.max_batch_size,
            last_trained_at: None,
        })
    }

    /// Trains every component whose dataset is present.
    ///
    /// Components are fitted on copies and only swapped in once all of them have
    /// succeeded, so a failure leaves the previously trained state untouched.
    #[instrument(skip(self, datasets))]
    pub fn train_models(&mut self, datasets: &TrainingDatasets) -> Result<TrainingReport, ServiceError> {
        if datasets.returns.is_none() && datasets.time_series.is_none() && datasets.historical.is_none() {
            return Err(ServiceError::ValidationError(
                "no training datasets supplied".to_string(),
            ));
        }

        let mut disposition = self.disposition.clone();
        let mut forecaster = self.forecaster.clone();
        let mut anomaly_detector = self.anomaly_detector.clone();

        let disposition_metrics = match &datasets.returns {
            Some(rows) => {
                let records = rows
                    .iter()
                    .map(|row| {
                        let record = row.to_record()?;
                        record.validate()?;
                        Ok(record)
                    })
                    .collect::<Result<Vec<ReturnRecord>, ServiceError>>()?;
                let labels: Vec<String> = rows.iter().map(|row| row.actual_disposition.clone()).collect();
                Some(disposition.train(&records, &labels)?)
            }
            None => None,
        };

        let forecasting_metrics = match &datasets.time_series {
            Some(series) => Some(forecaster.train(series)?),
            None => None,
        };

        let baseline = match &datasets.historical {
            Some(history) => Some(anomaly_detector.fit(history)?.clone()),
            None => None,
        };

        let trained_at = Utc::now();
        self.disposition = disposition;
        self.forecaster = forecaster;
        self.anomaly_detector = anomaly_detector;
        self.last_trained_at = Some(trained_at);

        info!(
            disposition = disposition_metrics.is_some(),
            forecasting = forecasting_metrics.is_some(),
            anomaly_detection = baseline.is_some(),
            "models trained"
        );
        Ok(TrainingReport {
            disposition: disposition_metrics,
            forecasting: forecasting_metrics,
            anomaly_detection: baseline,
            trained_at,
        })
    }

    #[instrument(skip(self, record), fields(sku = %record.sku))]
    pub fn predict_disposition(&self, record: &ReturnRecord) -> Result<PredictionResult, ServiceError> {
        record.validate()?;
        self.disposition.predict(record)
    }

    /// Predicts every record or fails as a whole.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn predict_batch(&self, records: &[ReturnRecord]) -> Result<Vec<PredictionResult>, ServiceError> {
        if records.len() > self.max_batch_size {
            return Err(ServiceError::invalid_field(
                "records",
                format!(
                    "batch of {} exceeds the limit of {}",
                    records.len(),
                    self.max_batch_size
                ),
            ));
        }
        records
            .iter()
            .map(|record| self.predict_disposition(record))
            .collect()
    }

    #[instrument(skip(self))]
    pub fn forecast_demand(
        &self,
        periods: u32,
        category: Option<&str>,
    ) -> Result<ForecastResult, ServiceError> {
        self.forecaster.forecast(periods, category)
    }

    #[instrument(skip(self, current), fields(rows = current.len()))]
    pub fn detect_anomalies(&self, current: &[ReturnCountRow]) -> Result<Vec<AnomalyRecord>, ServiceError> {
        self.anomaly_detector.detect(current)
    }

    pub fn assess_risk(&self, inputs: &RiskInputs) -> Result<RiskAssessment, ServiceError> {
        self.risk_scorer.assess(inputs)
    }

    pub fn generate_insights(&self, outcomes: &[ReturnOutcome]) -> Insights {
        generate_insights(outcomes)
    }

    pub fn optimize_hub_assignment(
        &self,
        items: &[ReturnRecord],
        hubs: &[HubCapacity],
    ) -> Result<Vec<HubAllocation>, ServiceError> {
        self.hub_router.assign(items, hubs)
    }

    pub fn model_status(&self) -> ModelStatus {
        ModelStatus {
            disposition: ComponentStatus {
                trained: self.disposition.is_trained(),
                algorithm: self.disposition.algorithm(),
                metrics: self.disposition.metrics().and_then(|m| serde_json::to_value(m).ok()),
            },
            forecasting: ComponentStatus {
                trained: self.forecaster.is_trained(),
                algorithm: self.forecaster.algorithm(),
                metrics: self.forecaster.metrics().and_then(|m| serde_json::to_value(m).ok()),
            },
            anomaly_detection: ComponentStatus {
                trained: self.anomaly_detector.is_fitted(),
                algorithm: ANOMALY_METHOD.to_string(),
                metrics: self
                    .anomaly_detector
                    .baseline()
                    .and_then(|b| serde_json::to_value(b).ok()),
            },
            last_trained_at: self.last_trained_at,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            feature_schema_version: FEATURE_SCHEMA_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            saved_at: Utc::now(),
            last_trained_at: self.last_trained_at,
            disposition: self.disposition.trained_state().cloned(),
            forecasting: self.forecaster.trained_state().cloned(),
            anomaly_detection: self.anomaly_detector.baseline().cloned(),
        }
    }

    /// Replaces the fitted state with `snapshot` after checking it was produced
    /// with the same feature layout.
    pub fn restore(&mut self, snapshot: EngineSnapshot) -> Result<(), PersistenceError> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ServiceError::SerializationError(format!(
                "unsupported snapshot format version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if snapshot.feature_schema_version != FEATURE_SCHEMA_VERSION
            || snapshot.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied())
        {
            return Err(ServiceError::SerializationError(
                "snapshot was written with a different feature schema".to_string(),
            ));
        }

        self.disposition.restore(snapshot.disposition);
        self.forecaster.restore(snapshot.forecasting);
        self.anomaly_detector.restore(snapshot.anomaly_detection);
        self.last_trained_at = snapshot.last_trained_at;
        Ok(())
    }

    /// Writes the fitted state as JSON, creating parent directories as needed.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_models(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)?;
        info!("models saved");
        Ok(())
    }

    /// Loads state written by [`save_models`](Self::save_models). On error the
    /// current state is kept.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load_models(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let snapshot: EngineSnapshot = serde_json::from_str(&raw).map_err_to_service()?;
        if snapshot.disposition.is_none() && snapshot.forecasting.is_none() && snapshot.anomaly_detection.is_none() {
            warn!("loaded snapshot contains no trained components");
        }
        self.restore(snapshot)?;
        info!("models loaded");
        Ok(())
    }
}

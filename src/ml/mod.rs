/*!
 * # Machine Learning Module
 *
 * Feature encoding, valuation rules and the trained components of the returns
 * engine: disposition classification, demand forecasting, anomaly detection,
 * risk scoring, insights and hub assignment. [`engine::PredictionEngine`] owns
 * one of each and is the entry point used by the binary and the tests.
 */

/// Anomaly detection over daily return counts
pub mod anomaly_detection;

/// Disposition classifier
pub mod disposition;

/// Orchestrator and model persistence
pub mod engine;

/// Classifier / regressor capabilities and their in-crate implementations
pub mod estimators;

/// Record to feature vector encoding
pub mod features;

/// Demand forecasting model
pub mod forecasting;

/// Summary statistics over historical outcomes
pub mod insights;

/// Operational risk scoring
pub mod risk;

/// Hub assignment for incoming returns
pub mod routing_model;

/// Value, sustainability and marketplace rules
pub mod valuation;

pub use anomaly_detection::{AnomalyBaseline, AnomalyDetector, AnomalyRecord};
pub use disposition::{DispositionPolicy, PredictionResult};
pub use engine::{EngineSnapshot, ModelStatus, PredictionEngine, TrainingReport};
pub use forecasting::{DemandForecaster, ForecastPoint, ForecastResult, Trend};
pub use insights::{generate_insights, Insights};
pub use risk::{RiskAssessment, RiskInputs, RiskLevel, RiskScorer};
pub use routing_model::{HubAllocation, HubCapacity, HubRoutingModel};

/// Rounds on the exact decimal expansion of `value`, ties to even.
///
/// `(value * 100.0).round() / 100.0` disagrees with this for inputs such as
/// 2.125 and 0.475 whose binary representation sits just below the tie.
pub(crate) fn round_decimal(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::return_record::ReturnRow;

/// One observation of recovered value used to train the demand forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub date: NaiveDate,
    pub value_recovered: f64,
    #[serde(default)]
    pub category_encoded: Option<f64>,
    #[serde(default)]
    pub avg_price: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub seasonality_score: Option<f64>,
}

/// Return count for one category on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnCountRow {
    pub date: NaiveDate,
    pub category: String,
    pub count: u64,
}

/// Realised outcome of a processed return, used for insight reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnOutcome {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub value_recovered: Option<f64>,
}

/// Training inputs for every engine component. Absent datasets skip that component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingDatasets {
    #[serde(default)]
    pub returns: Option<Vec<ReturnRow>>,
    #[serde(default)]
    pub time_series: Option<Vec<TimeSeriesRow>>,
    #[serde(default)]
    pub historical: Option<Vec<ReturnCountRow>>,
}

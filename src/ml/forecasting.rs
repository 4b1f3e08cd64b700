/*!
 * # Recovered-Value Forecasting
 *
 * Regresses recovered value on calendar and category features, then projects it over
 * monthly periods with a naive confidence band, a trend label and a seasonality
 * index derived from the projected series.
 */

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{info, instrument};

use super::estimators::metrics::{
    linear_slope, mean, mean_absolute_error, mean_absolute_percentage_error, r2_score,
    std_population, variance_population,
};
use super::estimators::{Regressor, RegressorModel, RegressorParams, StandardScaler};
use super::features::quarter;
use crate::errors::{ForecastError, ServiceError};
use crate::models::TimeSeriesRow;

/// Minimum rows needed for a train/holdout split
pub const MIN_TRAINING_ROWS: usize = 5;

const PERIOD_SPACING_DAYS: i64 = 30;
const BAND_Z: f64 = 1.96;
const BAND_STD_FRACTION: f64 = 0.1;
const TREND_SLOPE_THRESHOLD: f64 = 0.05;

// Placeholders used for periods that have not happened yet
const FUTURE_AVG_PRICE: f64 = 5000.0;
const FUTURE_VOLUME: f64 = 100.0;
const FUTURE_SEASONALITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// One projected period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-indexed
    pub period: u32,
    pub date: NaiveDate,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Holdout accuracy of the forecaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub r2_score: f64,
    /// Percent, over non-zero targets only
    pub mape: f64,
    pub n_train: usize,
    pub n_test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub predictions: Vec<ForecastPoint>,
    pub trend: Trend,
    /// Variance over squared mean of the projection, in [0, 1]
    pub seasonality_factor: f64,
    pub accuracy: RegressionMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub algorithm: String,
    pub params: RegressorParams,
    pub train_fraction: f64,
    pub max_periods: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            algorithm: "gradient_boosting".to_string(),
            params: RegressorParams::default(),
            train_fraction: 0.8,
            max_periods: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedForecaster {
    scaler: StandardScaler,
    model: RegressorModel,
    metrics: RegressionMetrics,
}

impl TrainedForecaster {
    pub fn metrics(&self) -> &RegressionMetrics {
        &self.metrics
    }
}

#[derive(Debug, Clone)]
pub struct DemandForecaster {
    settings: ForecastSettings,
    trained: Option<TrainedForecaster>,
}

impl DemandForecaster {
    pub fn new(settings: ForecastSettings) -> Result<Self, ServiceError> {
        RegressorModel::new(&settings.algorithm, settings.params)?;
        Ok(Self {
            settings,
            trained: None,
        })
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    /// Algorithm of the fitted model, or the configured one before training.
    pub fn algorithm(&self) -> String {
        match &self.trained {
            Some(trained) => trained.model.algorithm().to_string(),
            None => self.settings.algorithm.clone(),
        }
    }

    pub fn metrics(&self) -> Option<&RegressionMetrics> {
        self.trained.as_ref().map(TrainedForecaster::metrics)
    }

    pub fn trained_state(&self) -> Option<&TrainedForecaster> {
        self.trained.as_ref()
    }

    pub fn restore(&mut self, state: Option<TrainedForecaster>) {
        self.trained = state;
    }

    /// Fits on the earliest `train_fraction` of the series and scores the rest.
    #[instrument(skip(self, series), fields(rows = series.len()))]
    pub fn train(&mut self, series: &[TimeSeriesRow]) -> Result<RegressionMetrics, ForecastError> {
        if series.len() < MIN_TRAINING_ROWS {
            return Err(ServiceError::InsufficientData(format!(
                "forecasting needs at least {} rows, got {}",
                MIN_TRAINING_ROWS,
                series.len()
            )));
        }

        let mut ordered: Vec<&TimeSeriesRow> = series.iter().collect();
        ordered.sort_by_key(|row| row.date);
        let x: Vec<Vec<f64>> = ordered.iter().map(|row| history_features(row)).collect();
        let y: Vec<f64> = ordered.iter().map(|row| row.value_recovered).collect();

        let split = ((series.len() as f64 * self.settings.train_fraction) as usize)
            .clamp(1, series.len() - 1);
        let (x_train, x_test) = x.split_at(split);
        let (y_train, y_test) = y.split_at(split);

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(x_train)?;
        let mut model = RegressorModel::new(&self.settings.algorithm, self.settings.params)?;
        model.fit(&x_train, y_train)?;

        let predicted = model.predict(&scaler.transform(x_test)?)?;
        let metrics = RegressionMetrics {
            mae: mean_absolute_error(y_test, &predicted),
            r2_score: r2_score(y_test, &predicted),
            mape: mean_absolute_percentage_error(y_test, &predicted),
            n_train: y_train.len(),
            n_test: y_test.len(),
        };
        info!(mae = metrics.mae, r2 = metrics.r2_score, "forecasting model trained");

        self.trained = Some(TrainedForecaster {
            scaler,
            model,
            metrics: metrics.clone(),
        });
        Ok(metrics)
    }

    /// Projects `periods` monthly steps starting today.
    pub fn forecast(
        &self,
        periods: u32,
        category: Option<&str>,
    ) -> Result<ForecastResult, ForecastError> {
        self.forecast_from(Utc::now().date_naive(), periods, category)
    }

    /// Projects `periods` steps spaced 30 days apart, the first one on `start`.
    pub fn forecast_from(
        &self,
        start: NaiveDate,
        periods: u32,
        category: Option<&str>,
    ) -> Result<ForecastResult, ForecastError> {
        if periods == 0 || periods > self.settings.max_periods {
            return Err(ServiceError::invalid_field(
                "periods",
                format!("must be between 1 and {}", self.settings.max_periods),
            ));
        }
        let trained = self
            .trained
            .as_ref()
            .ok_or_else(|| ServiceError::NotTrained("forecasting model".to_string()))?;

        let category_score = future_category_score(category);
        let dates: Vec<NaiveDate> = (0..i64::from(periods))
            .map(|step| start + Duration::days(PERIOD_SPACING_DAYS * step))
            .collect();
        let rows: Vec<Vec<f64>> = dates
            .iter()
            .map(|date| {
                let mut row = calendar_features(*date);
                row.extend([category_score, FUTURE_AVG_PRICE, FUTURE_VOLUME, FUTURE_SEASONALITY]);
                row
            })
            .collect();

        let predicted = trained.model.predict(&trained.scaler.transform(&rows)?)?;
        let half_width = BAND_Z * BAND_STD_FRACTION * std_population(&predicted);

        let predictions = dates
            .into_iter()
            .zip(&predicted)
            .enumerate()
            .map(|(idx, (date, value))| ForecastPoint {
                period: idx as u32 + 1,
                date,
                predicted_value: *value,
                lower_bound: value - half_width,
                upper_bound: value + half_width,
            })
            .collect();

        Ok(ForecastResult {
            predictions,
            trend: classify_trend(&predicted),
            seasonality_factor: seasonality_factor(&predicted),
            accuracy: trained.metrics.clone(),
        })
    }
}

fn calendar_features(date: NaiveDate) -> Vec<f64> {
    vec![
        f64::from(date.month()),
        f64::from(quarter(date.month())),
        f64::from(date.weekday().num_days_from_monday()),
        f64::from(date.day()),
    ]
}

fn history_features(row: &TimeSeriesRow) -> Vec<f64> {
    let mut features = calendar_features(row.date);
    features.extend([
        row.category_encoded.unwrap_or(0.0),
        row.avg_price.unwrap_or(0.0),
        row.volume.unwrap_or(0.0),
        row.seasonality_score.unwrap_or(0.5),
    ]);
    features
}

/// Category score used for projected periods. Differs from the disposition encoding
/// for unlisted categories.
pub fn future_category_score(category: Option<&str>) -> f64 {
    match category {
        Some("Electronics") => 0.9,
        Some("Fashion") => 0.6,
        Some("Appliances") => 0.8,
        Some("Home & Kitchen") => 0.5,
        _ => 0.6,
    }
}

pub fn classify_trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }
    let slope = linear_slope(values);
    if slope > TREND_SLOPE_THRESHOLD {
        Trend::Increasing
    } else if slope < -TREND_SLOPE_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

pub fn seasonality_factor(values: &[f64]) -> f64 {
    if values.len() < 4 {
        return 0.0;
    }
    let mu = mean(values);
    if mu <= 0.0 {
        return 0.0;
    }
    (variance_population(values) / (mu * mu)).min(1.0)
}

/*!
 * # Return Volume Anomaly Detection
 *
 * Learns a baseline from historical per-category daily return counts and flags
 * current days whose total volume sits too many standard deviations from the
 * baseline, and categories whose total drifts too far from their historical mean.
 */

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tracing::{debug, info, instrument};

use super::estimators::metrics::{mean, std_sample};
use crate::errors::{AnomalyError, ServiceError};
use crate::models::ReturnCountRow;

/// z-score above which a volume anomaly is reported as high severity
const HIGH_VOLUME_Z: f64 = 3.0;
/// Relative deviation above which a category anomaly is reported as high severity
const HIGH_CATEGORY_DEVIATION: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnomalyKind {
    Volume,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// One flagged deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// ISO date for volume anomalies, category name for category anomalies
    pub key: String,
    pub observed: f64,
    pub expected: f64,
    /// z-score or relative deviation, depending on `kind`
    pub score: f64,
    pub severity: Severity,
    pub description: String,
}

/// Monthly mean counts with the three busiest and quietest months.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPatterns {
    pub monthly_means: BTreeMap<u32, f64>,
    pub peak_months: Vec<u32>,
    pub low_months: Vec<u32>,
}

/// Statistics fitted from history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyBaseline {
    pub daily_mean: f64,
    /// Sample standard deviation of daily totals; 0 with fewer than two days
    pub daily_std: f64,
    pub category_means: BTreeMap<String, f64>,
    pub seasonal_patterns: MonthlyPatterns,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    pub z_threshold: f64,
    pub category_deviation_threshold: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            z_threshold: 2.5,
            category_deviation_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    thresholds: AnomalyThresholds,
    baseline: Option<AnomalyBaseline>,
}

impl AnomalyDetector {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self {
            thresholds,
            baseline: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<&AnomalyBaseline> {
        self.baseline.as_ref()
    }

    pub fn restore(&mut self, baseline: Option<AnomalyBaseline>) {
        self.baseline = baseline;
    }

    #[instrument(skip(self, history), fields(rows = history.len()))]
    pub fn fit(&mut self, history: &[ReturnCountRow]) -> Result<&AnomalyBaseline, AnomalyError> {
        if history.is_empty() {
            return Err(ServiceError::InsufficientData(
                "anomaly baseline needs at least one row".to_string(),
            ));
        }

        let totals: Vec<f64> = daily_totals(history).values().map(|t| *t as f64).collect();
        let category_means = grouped_means(history.iter().map(|row| (row.category.clone(), row)));
        let monthly_means = grouped_means(history.iter().map(|row| (row.date.month(), row)));

        let baseline = AnomalyBaseline {
            daily_mean: mean(&totals),
            daily_std: std_sample(&totals),
            category_means,
            seasonal_patterns: monthly_patterns(monthly_means),
        };
        info!(
            days = totals.len(),
            daily_mean = baseline.daily_mean,
            daily_std = baseline.daily_std,
            "anomaly baseline fitted"
        );
        Ok(&*self.baseline.insert(baseline))
    }

    /// Flags volume anomalies per date (ascending), then category anomalies per
    /// category (sorted by name).
    pub fn detect(&self, current: &[ReturnCountRow]) -> Result<Vec<AnomalyRecord>, AnomalyError> {
        let baseline = self
            .baseline
            .as_ref()
            .ok_or_else(|| ServiceError::NotTrained("anomaly detector".to_string()))?;
        let mut anomalies = Vec::new();

        if baseline.daily_std > 0.0 {
            for (date, total) in daily_totals(current) {
                let z = (total as f64 - baseline.daily_mean).abs() / baseline.daily_std;
                if z > self.thresholds.z_threshold {
                    anomalies.push(AnomalyRecord {
                        kind: AnomalyKind::Volume,
                        key: date.to_string(),
                        observed: total as f64,
                        expected: baseline.daily_mean,
                        score: z,
                        severity: if z > HIGH_VOLUME_Z { Severity::High } else { Severity::Medium },
                        description: format!(
                            "Unusual return volume: {} vs expected {:.0}",
                            total, baseline.daily_mean
                        ),
                    });
                }
            }
        }

        let mut category_totals: BTreeMap<&str, u64> = BTreeMap::new();
        for row in current {
            *category_totals.entry(row.category.as_str()).or_default() += row.count;
        }
        for (category, total) in category_totals {
            let expected = baseline.category_means.get(category).copied().unwrap_or(0.0);
            if expected <= 0.0 {
                continue;
            }
            let deviation = (total as f64 - expected).abs() / expected;
            if deviation > self.thresholds.category_deviation_threshold {
                anomalies.push(AnomalyRecord {
                    kind: AnomalyKind::Category,
                    key: category.to_string(),
                    observed: total as f64,
                    expected,
                    score: deviation,
                    severity: if deviation > HIGH_CATEGORY_DEVIATION {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    description: format!(
                        "Unusual {} returns: {} vs expected {:.0}",
                        category, total, expected
                    ),
                });
            }
        }

        debug!(flagged = anomalies.len(), "anomaly scan finished");
        Ok(anomalies)
    }
}

fn daily_totals(rows: &[ReturnCountRow]) -> BTreeMap<NaiveDate, u64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        *totals.entry(row.date).or_default() += row.count;
    }
    totals
}

/// Mean per-row count for each key.
fn grouped_means<'a, K: Ord>(
    rows: impl Iterator<Item = (K, &'a ReturnCountRow)>,
) -> BTreeMap<K, f64> {
    let mut sums: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for (key, row) in rows {
        let entry = sums.entry(key).or_default();
        entry.0 += row.count as f64;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

fn monthly_patterns(monthly_means: BTreeMap<u32, f64>) -> MonthlyPatterns {
    let mut ranked: Vec<(u32, f64)> = monthly_means.iter().map(|(m, v)| (*m, *v)).collect();

    // Stable sorts keep calendar order among equal means
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let peak_months = ranked.iter().take(3).map(|(m, _)| *m).collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    let low_months = ranked.iter().take(3).map(|(m, _)| *m).collect();

    MonthlyPatterns {
        monthly_means,
        peak_months,
        low_months,
    }
}

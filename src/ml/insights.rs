use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::estimators::metrics::mean;
use super::forecasting::Trend;
use crate::models::ReturnOutcome;

const TOP_CATEGORY_COUNT: usize = 3;
/// Month-over-month change beyond which the value trend is not stable
const MONTHLY_TREND_THRESHOLD: f64 = 0.1;
/// Share of defective items above which quality control is flagged
const DEFECTIVE_SHARE_THRESHOLD: f64 = 0.2;

pub const DEFECTIVE_RATE_RECOMMENDATION: &str =
    "High defective rate detected - review quality control processes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Absent when fewer than two months carry dated values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_trend: Option<Trend>,
}

/// Summary of historical return outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub total_items: usize,
    /// Mean of the rows that carry a recovered value, 0 when none do
    pub avg_value: f64,
    pub top_categories: Vec<CategoryCount>,
    pub trend_analysis: TrendAnalysis,
    pub recommendations: Vec<String>,
}

pub fn generate_insights(outcomes: &[ReturnOutcome]) -> Insights {
    let values: Vec<f64> = outcomes.iter().filter_map(|o| o.value_recovered).collect();

    Insights {
        total_items: outcomes.len(),
        avg_value: mean(&values),
        top_categories: top_categories(outcomes),
        trend_analysis: TrendAnalysis {
            value_trend: monthly_value_trend(outcomes),
        },
        recommendations: recommendations(outcomes),
    }
}

/// Most frequent categories, ties kept in order of first appearance.
fn top_categories(outcomes: &[ReturnOutcome]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for category in outcomes.iter().filter_map(|o| o.category.as_deref()) {
        match counts.iter_mut().find(|c| c.category == category) {
            Some(entry) => entry.count += 1,
            None => counts.push(CategoryCount {
                category: category.to_string(),
                count: 1,
            }),
        }
    }
    // stable sort keeps first-appearance order among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_CATEGORY_COUNT);
    counts
}

fn monthly_value_trend(outcomes: &[ReturnOutcome]) -> Option<Trend> {
    let mut monthly: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for outcome in outcomes {
        if let (Some(date), Some(value)) = (outcome.date, outcome.value_recovered) {
            *monthly.entry((date.year(), date.month())).or_insert(0.0) += value;
        }
    }
    if monthly.len() < 2 {
        return None;
    }

    let mut recent = monthly.values().rev();
    let last = *recent.next()?;
    let previous = *recent.next()?;
    let change = (last - previous) / previous;

    // 0/0 is NaN and lands on stable
    Some(if change > MONTHLY_TREND_THRESHOLD {
        Trend::Increasing
    } else if change < -MONTHLY_TREND_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    })
}

fn recommendations(outcomes: &[ReturnOutcome]) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(category) = worst_category(outcomes) {
        recommendations.push(format!("Focus improvement efforts on {} category", category));
    }

    let defective = outcomes
        .iter()
        .filter(|o| o.condition.as_deref() == Some("defective"))
        .count();
    if defective as f64 > outcomes.len() as f64 * DEFECTIVE_SHARE_THRESHOLD {
        recommendations.push(DEFECTIVE_RATE_RECOMMENDATION.to_string());
    }

    recommendations
}

/// Category with the lowest mean recovered value. Categories without any
/// recorded value are ignored; ties go to the alphabetically first name.
fn worst_category(outcomes: &[ReturnOutcome]) -> Option<String> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for outcome in outcomes {
        let (Some(category), Some(value)) = (outcome.category.as_deref(), outcome.value_recovered)
        else {
            continue;
        };
        let entry = totals.entry(category).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    let mut worst: Option<(&str, f64)> = None;
    for (category, (sum, count)) in totals {
        let category_mean = sum / count as f64;
        if worst.map_or(true, |(_, lowest)| category_mean < lowest) {
            worst = Some((category, category_mean));
        }
    }
    worst.map(|(category, _)| category.to_string())
}

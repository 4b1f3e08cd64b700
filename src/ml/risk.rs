/*!
 * # Operational Risk Scoring
 *
 * Five bounded component scores (0 to 100) combined with fixed weights into an
 * overall score, a tier and a list of mitigation recommendations.
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use validator::Validate;

use super::round_decimal;
use crate::errors::ServiceError;

/// Component score above which its recommendation is emitted
const COMPONENT_ALERT_SCORE: f64 = 70.0;
/// Overall score at or above which the urgent recommendation is emitted
const URGENT_SCORE: f64 = 80.0;

pub const URGENT_RECOMMENDATION: &str =
    "URGENT: Immediate intervention required across all risk areas";

/// Operating ratios for a category or hub. Missing fields count as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RiskInputs {
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub return_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub value_recovery_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub defect_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub demand_volatility: f64,
    /// Days
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub avg_processing_time: f64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskComponent {
    #[serde(rename = "volume_risk")]
    #[strum(serialize = "volume_risk")]
    Volume,
    #[serde(rename = "value_risk")]
    #[strum(serialize = "value_risk")]
    Value,
    #[serde(rename = "quality_risk")]
    #[strum(serialize = "quality_risk")]
    Quality,
    #[serde(rename = "market_risk")]
    #[strum(serialize = "market_risk")]
    Market,
    #[serde(rename = "operational_risk")]
    #[strum(serialize = "operational_risk")]
    Operational,
}

impl RiskComponent {
    pub fn weight(self) -> f64 {
        match self {
            RiskComponent::Volume => 0.30,
            RiskComponent::Value => 0.25,
            RiskComponent::Quality => 0.20,
            RiskComponent::Market => 0.15,
            RiskComponent::Operational => 0.10,
        }
    }

    /// Component score in [0, 100].
    pub fn score(self, inputs: &RiskInputs) -> f64 {
        match self {
            RiskComponent::Volume => (inputs.return_rate / 0.15).min(1.0) * 100.0,
            RiskComponent::Value => ((0.6 - inputs.value_recovery_rate) / 0.6).max(0.0) * 100.0,
            RiskComponent::Quality => (inputs.defect_rate / 0.10).min(1.0) * 100.0,
            RiskComponent::Market => (inputs.demand_volatility / 0.30).min(1.0) * 100.0,
            RiskComponent::Operational => (inputs.avg_processing_time / 7.0).min(1.0) * 100.0,
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            RiskComponent::Volume => {
                "Implement return prevention strategies and improve product descriptions"
            }
            RiskComponent::Value => "Optimize pricing strategies and explore new marketplaces",
            RiskComponent::Quality => "Enhance quality control processes and supplier management",
            RiskComponent::Market => "Diversify market channels and improve demand forecasting",
            RiskComponent::Operational => "Streamline processing workflows and increase capacity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 40.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Rounded to one decimal
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub component_scores: BTreeMap<RiskComponent, f64>,
    pub recommendations: Vec<String>,
}

/// Stateless scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, inputs: &RiskInputs) -> Result<RiskAssessment, ServiceError> {
        inputs.validate()?;

        let component_scores: BTreeMap<RiskComponent, f64> = RiskComponent::iter()
            .map(|component| (component, component.score(inputs)))
            .collect();
        let overall: f64 = component_scores
            .iter()
            .map(|(component, score)| score * component.weight())
            .sum();

        let mut recommendations: Vec<String> = component_scores
            .iter()
            .filter(|(_, score)| **score > COMPONENT_ALERT_SCORE)
            .map(|(component, _)| component.recommendation().to_string())
            .collect();
        if overall >= URGENT_SCORE {
            recommendations.push(URGENT_RECOMMENDATION.to_string());
        }

        Ok(RiskAssessment {
            overall_score: round_decimal(overall, 1),
            // Tier uses the unrounded score
            risk_level: RiskLevel::from_score(overall),
            component_scores,
            recommendations,
        })
    }
}

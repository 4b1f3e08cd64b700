use serde::{Deserialize, Serialize};

use super::check_width;
use super::metrics::{mean, std_population};
use crate::errors::ServiceError;

/// Maps string labels to dense ids in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, labels: &[String]) {
        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();
        self.classes = classes;
    }

    pub fn fit_transform(&mut self, labels: &[String]) -> Vec<usize> {
        self.fit(labels);
        // Every label was just registered, so the lookup cannot miss
        labels
            .iter()
            .map(|label| self.classes.binary_search(label).unwrap_or_default())
            .collect()
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>, ServiceError> {
        labels
            .iter()
            .map(|label| {
                self.classes.binary_search(label).map_err(|_| {
                    ServiceError::ValidationError(format!("unseen label '{}'", label))
                })
            })
            .collect()
    }

    pub fn inverse_transform(&self, ids: &[usize]) -> Result<Vec<String>, ServiceError> {
        ids.iter()
            .map(|id| {
                self.classes.get(*id).cloned().ok_or_else(|| {
                    ServiceError::ValidationError(format!("label id {} out of range", id))
                })
            })
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Per-column standardisation with population standard deviation.
///
/// Constant columns keep a scale of 1 so they map to 0 instead of NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &[Vec<f64>]) -> Result<(), ServiceError> {
        let width = x.first().map(Vec::len).ok_or_else(|| {
            ServiceError::InsufficientData("cannot fit a scaler on zero rows".to_string())
        })?;
        check_width(x, width)?;

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for col in 0..width {
            let column: Vec<f64> = x.iter().map(|row| row[col]).collect();
            let std = std_population(&column);
            means.push(mean(&column));
            scales.push(if std > 0.0 { std } else { 1.0 });
        }
        self.mean = means;
        self.scale = scales;
        Ok(())
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ServiceError> {
        if self.mean.is_empty() {
            return Err(ServiceError::NotTrained("scaler has not been fitted".to_string()));
        }
        check_width(x, self.mean.len())?;

        Ok(x.iter()
            .map(|row| {
                row.iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(value, (mean, scale))| (value - mean) / scale)
                    .collect()
            })
            .collect())
    }

    pub fn fit_transform(&mut self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ServiceError> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn label_ids_follow_sorted_order() {
        let mut encoder = LabelEncoder::new();
        let ids = encoder.fit_transform(&labels(&["repair", "donate", "resale", "repair"]));
        assert_eq!(encoder.classes(), ["donate", "repair", "resale"]);
        assert_eq!(ids, vec![1, 0, 2, 1]);
        assert_eq!(encoder.inverse_transform(&[2, 0]).unwrap(), labels(&["resale", "donate"]));
    }

    #[test]
    fn unseen_labels_and_ids_are_errors() {
        let mut encoder = LabelEncoder::new();
        encoder.fit(&labels(&["a", "b"]));
        assert_matches!(encoder.transform(&labels(&["c"])), Err(ServiceError::ValidationError(_)));
        assert_matches!(encoder.inverse_transform(&[5]), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn scaler_standardises_columns() {
        let mut scaler = StandardScaler::new();
        let x = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaled = scaler.fit_transform(&x).unwrap();
        assert_eq!(scaled, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn scaler_requires_fit_and_matching_width() {
        let scaler = StandardScaler::new();
        assert_matches!(scaler.transform(&[vec![1.0]]), Err(ServiceError::NotTrained(_)));

        let mut scaler = StandardScaler::new();
        scaler.fit(&[vec![1.0, 2.0]]).unwrap();
        assert_matches!(scaler.transform(&[vec![1.0]]), Err(ServiceError::ValidationError(_)));
    }
}

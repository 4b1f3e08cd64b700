use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::mean;
use super::tree::{DecisionTree, TreeParams};
use super::{check_training_shape, check_width, Regressor, RegressorParams};
use crate::errors::ServiceError;

/// Least-squares gradient boosting.
///
/// Starts from the target mean and adds `n_estimators` regression trees, each fit
/// to the current residuals and shrunk by `learning_rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: RegressorParams,
    init: Option<f64>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl GradientBoostingRegressor {
    pub fn new(params: RegressorParams) -> Self {
        Self {
            params,
            init: None,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ServiceError> {
        let n_features = check_training_shape(x, y.len())?;
        if self.params.learning_rate.is_nan() || self.params.learning_rate <= 0.0 {
            return Err(ServiceError::ValidationError(
                "learning_rate must be positive".to_string(),
            ));
        }

        let init = mean(y);
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            max_features: None,
        };
        let unit_weights = vec![1.0; y.len()];
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut predictions = vec![init; y.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();
            let tree = DecisionTree::fit_regression(
                x,
                &residuals,
                &unit_weights,
                (0..x.len()).collect(),
                tree_params,
                &mut rng,
            );
            for (prediction, row) in predictions.iter_mut().zip(x) {
                *prediction += self.params.learning_rate * tree.leaf_value(row)[0];
            }
            trees.push(tree);
        }

        debug!(trees = trees.len(), rows = x.len(), init, "gradient boosting fitted");
        self.init = Some(init);
        self.n_features = n_features;
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ServiceError> {
        let init = self
            .init
            .ok_or_else(|| ServiceError::NotTrained("gradient boosting regressor".to_string()))?;
        check_width(x, self.n_features)?;

        Ok(x.iter()
            .map(|row| {
                self.trees.iter().fold(init, |acc, tree| {
                    acc + self.params.learning_rate * tree.leaf_value(row)[0]
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::estimators::metrics::mean_absolute_error;

    #[test]
    fn zero_estimators_predicts_the_mean() {
        let mut model = GradientBoostingRegressor::new(RegressorParams {
            n_estimators: 0,
            ..RegressorParams::default()
        });
        model.fit(&[vec![0.0], vec![1.0]], &[2.0, 4.0]).unwrap();
        assert_eq!(model.predict(&[vec![7.0]]).unwrap(), vec![3.0]);
    }

    #[test]
    fn boosting_reduces_training_error() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).sin() * 10.0 + 50.0).collect();

        let mut weak = GradientBoostingRegressor::new(RegressorParams {
            n_estimators: 1,
            max_depth: 2,
            ..RegressorParams::default()
        });
        let mut strong = GradientBoostingRegressor::new(RegressorParams {
            n_estimators: 60,
            max_depth: 2,
            ..RegressorParams::default()
        });
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let weak_err = mean_absolute_error(&y, &weak.predict(&x).unwrap());
        let strong_err = mean_absolute_error(&y, &strong.predict(&x).unwrap());
        assert!(strong_err < weak_err);
        assert_eq!(strong.n_trees(), 60);
    }

    #[test]
    fn constant_target_is_reproduced() {
        let mut model = GradientBoostingRegressor::new(RegressorParams::default());
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, 1.0]).collect();
        model.fit(&x, &[8.0; 5]).unwrap();
        for value in model.predict(&x).unwrap() {
            assert!((value - 8.0).abs() < 1e-9);
        }
    }
}

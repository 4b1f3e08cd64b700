use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{check_labels, class_sample_weights, DecisionTree, TreeParams};
use super::{check_training_shape, check_width, Classifier, ClassifierParams};
use crate::errors::ServiceError;

/// Bagged ensemble of classification trees.
///
/// Each tree sees a bootstrap resample of the rows and considers `sqrt(n_features)`
/// candidate features per split. Probabilities are the mean of the leaf
/// distributions across trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ClassifierParams,
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self {
            params,
            n_classes: 0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn max_features(n_features: usize) -> usize {
        ((n_features as f64).sqrt() as usize).max(1)
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<(), ServiceError> {
        let n_features = check_training_shape(x, y.len())?;
        check_labels(y, n_classes)?;
        if self.params.n_estimators == 0 {
            return Err(ServiceError::ValidationError(
                "random forest needs at least one estimator".to_string(),
            ));
        }

        let weights = class_sample_weights(y, n_classes, self.params.balanced_class_weights);
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            max_features: Some(Self::max_features(n_features)),
        };

        let mut seeder = StdRng::seed_from_u64(self.params.seed);
        let n_rows = x.len();
        let trees = (0..self.params.n_estimators)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seeder.gen());
                let bootstrap: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                DecisionTree::fit_classification(
                    x,
                    y,
                    n_classes,
                    &weights,
                    bootstrap,
                    tree_params,
                    &mut rng,
                )
            })
            .collect::<Vec<_>>();

        debug!(
            trees = trees.len(),
            rows = n_rows,
            features = n_features,
            "random forest fitted"
        );
        self.trees = trees;
        self.n_classes = n_classes;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ServiceError> {
        if self.trees.is_empty() {
            return Err(ServiceError::NotTrained("random forest classifier".to_string()));
        }
        check_width(x, self.n_features)?;

        let n_trees = self.trees.len() as f64;
        Ok(x.iter()
            .map(|row| {
                let mut totals = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    for (total, p) in totals.iter_mut().zip(tree.leaf_value(row)) {
                        *total += p;
                    }
                }
                totals.iter().map(|t| t / n_trees).collect()
            })
            .collect())
    }
}

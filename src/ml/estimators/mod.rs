/*!
 * # Estimators
 *
 * Small, serializable implementations of the statistical collaborators the engine
 * trains: a CART decision tree, a bagged random forest classifier, a gradient
 * boosted regressor, plus the label encoder, scaler and metric helpers around them.
 *
 * Concrete algorithms are enum-dispatched ([`ClassifierModel`], [`RegressorModel`])
 * so that fitted state can be persisted with serde and restored exactly.
 */

pub mod boosting;
pub mod forest;
pub mod metrics;
pub mod preprocessing;
pub mod tree;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::ServiceError;

pub use boosting::GradientBoostingRegressor;
pub use forest::RandomForestClassifier;
pub use preprocessing::{LabelEncoder, StandardScaler};
pub use tree::{DecisionTree, DecisionTreeClassifier, DecisionTreeRegressor, TreeParams};

/// Multi-class probabilistic classifier over dense feature rows.
pub trait Classifier {
    /// Fits on rows `x` with class ids `y` drawn from `0..n_classes`.
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<(), ServiceError>;

    /// One probability distribution of length `n_classes` per row.
    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ServiceError>;

    /// Most probable class per row; ties resolve to the lowest class id.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>, ServiceError> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|probabilities| argmax(probabilities))
            .collect())
    }
}

/// Real-valued regressor over dense feature rows.
pub trait Regressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ServiceError>;
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ServiceError>;
}

/// Index of the first maximum.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ClassifierAlgorithm {
    RandomForest,
    DecisionTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RegressorAlgorithm {
    GradientBoosting,
    DecisionTree,
}

impl ClassifierAlgorithm {
    pub fn parse(name: &str) -> Result<Self, ServiceError> {
        name.parse().map_err(|_| {
            ServiceError::UnsupportedAlgorithm(format!("'{}' is not a known classifier", name))
        })
    }
}

impl RegressorAlgorithm {
    pub fn parse(name: &str) -> Result<Self, ServiceError> {
        name.parse().map_err(|_| {
            ServiceError::UnsupportedAlgorithm(format!("'{}' is not a known regressor", name))
        })
    }
}

/// Hyperparameters shared by the classifier algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
    pub balanced_class_weights: bool,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
            balanced_class_weights: true,
        }
    }
}

/// Hyperparameters shared by the regressor algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressorParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for RegressorParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// Classifier chosen by configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClassifierModel {
    RandomForest(RandomForestClassifier),
    DecisionTree(DecisionTreeClassifier),
}

impl ClassifierModel {
    /// Builds an unfitted classifier, rejecting unknown algorithm names.
    pub fn new(algorithm: &str, params: ClassifierParams) -> Result<Self, ServiceError> {
        Ok(match ClassifierAlgorithm::parse(algorithm)? {
            ClassifierAlgorithm::RandomForest => {
                ClassifierModel::RandomForest(RandomForestClassifier::new(params))
            }
            ClassifierAlgorithm::DecisionTree => {
                ClassifierModel::DecisionTree(DecisionTreeClassifier::new(params))
            }
        })
    }

    pub fn algorithm(&self) -> ClassifierAlgorithm {
        match self {
            ClassifierModel::RandomForest(_) => ClassifierAlgorithm::RandomForest,
            ClassifierModel::DecisionTree(_) => ClassifierAlgorithm::DecisionTree,
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<(), ServiceError> {
        match self {
            ClassifierModel::RandomForest(model) => model.fit(x, y, n_classes),
            ClassifierModel::DecisionTree(model) => model.fit(x, y, n_classes),
        }
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ServiceError> {
        match self {
            ClassifierModel::RandomForest(model) => model.predict_proba(x),
            ClassifierModel::DecisionTree(model) => model.predict_proba(x),
        }
    }
}

/// Regressor chosen by configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RegressorModel {
    GradientBoosting(GradientBoostingRegressor),
    DecisionTree(DecisionTreeRegressor),
}

impl RegressorModel {
    /// Builds an unfitted regressor, rejecting unknown algorithm names.
    pub fn new(algorithm: &str, params: RegressorParams) -> Result<Self, ServiceError> {
        Ok(match RegressorAlgorithm::parse(algorithm)? {
            RegressorAlgorithm::GradientBoosting => {
                RegressorModel::GradientBoosting(GradientBoostingRegressor::new(params))
            }
            RegressorAlgorithm::DecisionTree => {
                RegressorModel::DecisionTree(DecisionTreeRegressor::new(params))
            }
        })
    }

    pub fn algorithm(&self) -> RegressorAlgorithm {
        match self {
            RegressorModel::GradientBoosting(_) => RegressorAlgorithm::GradientBoosting,
            RegressorModel::DecisionTree(_) => RegressorAlgorithm::DecisionTree,
        }
    }
}

impl Regressor for RegressorModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ServiceError> {
        match self {
            RegressorModel::GradientBoosting(model) => model.fit(x, y),
            RegressorModel::DecisionTree(model) => model.fit(x, y),
        }
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ServiceError> {
        match self {
            RegressorModel::GradientBoosting(model) => model.predict(x),
            RegressorModel::DecisionTree(model) => model.predict(x),
        }
    }
}

/// Checks that `x` is non-empty, rectangular and matches `y` in length.
pub(crate) fn check_training_shape(x: &[Vec<f64>], y_len: usize) -> Result<usize, ServiceError> {
    if x.is_empty() {
        return Err(ServiceError::InsufficientData(
            "cannot fit on an empty sample".to_string(),
        ));
    }
    if x.len() != y_len {
        return Err(ServiceError::ValidationError(format!(
            "feature rows ({}) and targets ({}) differ in length",
            x.len(),
            y_len
        )));
    }
    let width = x[0].len();
    check_width(x, width)?;
    Ok(width)
}

/// Checks every row has `width` columns.
pub(crate) fn check_width(x: &[Vec<f64>], width: usize) -> Result<(), ServiceError> {
    match x.iter().position(|row| row.len() != width) {
        Some(idx) => Err(ServiceError::ValidationError(format!(
            "row {} has {} features, expected {}",
            idx,
            x[idx].len(),
            width
        ))),
        None => Ok(()),
    }
}

/*!
 * # CART Decision Trees
 *
 * Binary trees grown greedily on axis-aligned thresholds. Classification nodes
 * minimise weighted Gini impurity and store the weighted class distribution;
 * regression nodes minimise squared error and store the weighted mean.
 *
 * Thresholds sit halfway between adjacent distinct feature values and a row goes
 * left when `value <= threshold`. Candidate features are visited in a seeded random
 * order so ties between equally good splits are broken reproducibly; a split keeps
 * drawing features until `max_features` non-constant ones have been examined.
 */

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{check_training_shape, check_width, Classifier, ClassifierParams, Regressor, RegressorParams};
use crate::errors::ServiceError;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features examined per split; `None` examines all of them
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree stored as a flat node arena rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

enum Target<'a> {
    Classes { y: &'a [usize], n_classes: usize },
    Values(&'a [f64]),
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    cost: f64,
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    target: Target<'a>,
    weights: &'a [f64],
    params: TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grows a classification tree over `samples`, which may repeat row indices.
    pub fn fit_classification(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        weights: &[f64],
        samples: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        Grower::new(x, Target::Classes { y, n_classes }, weights, params, rng).build(samples)
    }

    /// Grows a regression tree over `samples`, which may repeat row indices.
    pub fn fit_regression(
        x: &[Vec<f64>],
        y: &[f64],
        weights: &[f64],
        samples: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        Grower::new(x, Target::Values(y), weights, params, rng).build(samples)
    }

    /// Leaf payload reached by `row`: a class distribution or a single mean.
    pub fn leaf_value(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

impl<'a> Grower<'a> {
    fn new(
        x: &'a [Vec<f64>],
        target: Target<'a>,
        weights: &'a [f64],
        params: TreeParams,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            x,
            target,
            weights,
            params,
            rng,
            nodes: Vec::new(),
        }
    }

    fn build(mut self, samples: Vec<usize>) -> DecisionTree {
        let n_features = self.x.first().map_or(0, Vec::len);
        self.grow(samples, 0);
        DecisionTree {
            nodes: self.nodes,
            n_features,
        }
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_payload(&samples),
        });

        let parent_cost = self.node_cost(&samples);
        if depth >= self.params.max_depth
            || samples.len() < self.params.min_samples_split.max(2)
            || parent_cost <= 1e-12
        {
            return node_idx;
        }

        let Some(split) = self.best_split(&samples, parent_cost) else {
            return node_idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&row| self.x[row][split.feature] <= split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn leaf_payload(&self, samples: &[usize]) -> Vec<f64> {
        match &self.target {
            Target::Classes { y, n_classes } => {
                let mut counts = vec![0.0; *n_classes];
                for &row in samples {
                    counts[y[row]] += self.weights[row];
                }
                let total: f64 = counts.iter().sum();
                if total > 0.0 {
                    counts.iter().map(|c| c / total).collect()
                } else {
                    vec![1.0 / *n_classes as f64; *n_classes]
                }
            }
            Target::Values(y) => {
                let (sum_w, sum_wy) = samples.iter().fold((0.0, 0.0), |(w, wy), &row| {
                    (w + self.weights[row], wy + self.weights[row] * y[row])
                });
                vec![if sum_w > 0.0 { sum_wy / sum_w } else { 0.0 }]
            }
        }
    }

    /// Weighted impurity mass of a node: `W * gini` or the weighted sum of squares.
    fn node_cost(&self, samples: &[usize]) -> f64 {
        match &self.target {
            Target::Classes { y, n_classes } => {
                let mut counts = vec![0.0; *n_classes];
                for &row in samples {
                    counts[y[row]] += self.weights[row];
                }
                gini_mass(&counts, counts.iter().sum())
            }
            Target::Values(y) => {
                let sum_w: f64 = samples.iter().map(|&row| self.weights[row]).sum();
                if sum_w <= 0.0 {
                    return 0.0;
                }
                let mean = samples
                    .iter()
                    .map(|&row| self.weights[row] * y[row])
                    .sum::<f64>()
                    / sum_w;
                samples
                    .iter()
                    .map(|&row| self.weights[row] * (y[row] - mean).powi(2))
                    .sum()
            }
        }
    }

    fn best_split(&mut self, samples: &[usize], parent_cost: f64) -> Option<SplitCandidate> {
        let n_features = self.x[samples[0]].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut *self.rng);
        let limit = self
            .params
            .max_features
            .map_or(n_features, |m| m.clamp(1, n_features.max(1)));

        // Constant features do not count towards the limit
        let mut visited = 0;
        let mut best: Option<SplitCandidate> = None;
        for feature in features {
            if visited >= limit {
                break;
            }
            let mut order = samples.to_vec();
            order.sort_by(|a, b| self.x[*a][feature].total_cmp(&self.x[*b][feature]));
            let (first, last) = (order[0], order[order.len() - 1]);
            if self.x[first][feature] >= self.x[last][feature] {
                continue;
            }
            visited += 1;

            if let Some(candidate) = self.scan_feature(feature, &order) {
                if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                    best = Some(candidate);
                }
            }
        }

        best.filter(|b| parent_cost - b.cost > 1e-12 * parent_cost.max(1.0))
    }

    /// Lowest-cost threshold on one feature given rows sorted by that feature.
    fn scan_feature(&self, feature: usize, order: &[usize]) -> Option<SplitCandidate> {
        let value_at = |pos: usize| self.x[order[pos]][feature];
        let mut best: Option<SplitCandidate> = None;
        let mut consider = |pos: usize, cost: f64| {
            let (lo, hi) = (value_at(pos), value_at(pos + 1));
            if lo < hi && best.as_ref().map_or(true, |b| cost < b.cost) {
                let mut threshold = lo / 2.0 + hi / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    cost,
                });
            }
        };

        match &self.target {
            Target::Classes { y, n_classes } => {
                let mut total = vec![0.0; *n_classes];
                for &row in order {
                    total[y[row]] += self.weights[row];
                }
                let total_w: f64 = total.iter().sum();
                let mut left = vec![0.0; *n_classes];
                let mut left_w = 0.0;

                for pos in 0..order.len() - 1 {
                    let row = order[pos];
                    left[y[row]] += self.weights[row];
                    left_w += self.weights[row];
                    let right_w = total_w - left_w;
                    if left_w <= 0.0 || right_w <= 0.0 {
                        continue;
                    }
                    let right: Vec<f64> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
                    consider(pos, gini_mass(&left, left_w) + gini_mass(&right, right_w));
                }
            }
            Target::Values(y) => {
                // Centre targets so the running sums stay well conditioned
                let (total_w, total_wy) = order.iter().fold((0.0, 0.0), |(w, wy), &row| {
                    (w + self.weights[row], wy + self.weights[row] * y[row])
                });
                if total_w <= 0.0 {
                    return None;
                }
                let centre = total_wy / total_w;
                let (mut sum_wy, mut sum_wy2) = (0.0, 0.0);
                for &row in order {
                    let c = y[row] - centre;
                    sum_wy += self.weights[row] * c;
                    sum_wy2 += self.weights[row] * c * c;
                }

                let (mut left_w, mut left_wy, mut left_wy2) = (0.0, 0.0, 0.0);
                for pos in 0..order.len() - 1 {
                    let row = order[pos];
                    let w = self.weights[row];
                    let c = y[row] - centre;
                    left_w += w;
                    left_wy += w * c;
                    left_wy2 += w * c * c;
                    let right_w = total_w - left_w;
                    if left_w <= 0.0 || right_w <= 0.0 {
                        continue;
                    }
                    let right_wy = sum_wy - left_wy;
                    let right_wy2 = sum_wy2 - left_wy2;
                    let cost = (left_wy2 - left_wy * left_wy / left_w)
                        + (right_wy2 - right_wy * right_wy / right_w);
                    consider(pos, cost);
                }
            }
        }

        best
    }
}

fn gini_mass(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    total - counts.iter().map(|c| c * c).sum::<f64>() / total
}

/// Per-row weights: `n / (k * count(class))` when balanced, otherwise 1.
pub(crate) fn class_sample_weights(y: &[usize], n_classes: usize, balanced: bool) -> Vec<f64> {
    if !balanced {
        return vec![1.0; y.len()];
    }
    let mut counts = vec![0usize; n_classes];
    for label in y {
        counts[*label] += 1;
    }
    let present = counts.iter().filter(|c| **c > 0).count().max(1);
    y.iter()
        .map(|label| y.len() as f64 / (present * counts[*label]) as f64)
        .collect()
}

pub(crate) fn check_labels(y: &[usize], n_classes: usize) -> Result<(), ServiceError> {
    match y.iter().find(|label| **label >= n_classes) {
        Some(label) => Err(ServiceError::ValidationError(format!(
            "class id {} outside 0..{}",
            label, n_classes
        ))),
        None => Ok(()),
    }
}

/// A single classification tree using every feature at each split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    params: ClassifierParams,
    n_classes: usize,
    tree: Option<DecisionTree>,
}

impl DecisionTreeClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self {
            params,
            n_classes: 0,
            tree: None,
        }
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<(), ServiceError> {
        check_training_shape(x, y.len())?;
        check_labels(y, n_classes)?;

        let weights = class_sample_weights(y, n_classes, self.params.balanced_class_weights);
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            max_features: None,
        };
        self.tree = Some(DecisionTree::fit_classification(
            x,
            y,
            n_classes,
            &weights,
            (0..x.len()).collect(),
            params,
            &mut rng,
        ));
        self.n_classes = n_classes;
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ServiceError> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| ServiceError::NotTrained("decision tree classifier".to_string()))?;
        check_width(x, tree.n_features())?;
        Ok(x.iter().map(|row| tree.leaf_value(row).to_vec()).collect())
    }
}

/// A single regression tree using every feature at each split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    params: RegressorParams,
    tree: Option<DecisionTree>,
}

impl DecisionTreeRegressor {
    pub fn new(params: RegressorParams) -> Self {
        Self { params, tree: None }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ServiceError> {
        check_training_shape(x, y.len())?;
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            max_features: None,
        };
        self.tree = Some(DecisionTree::fit_regression(
            x,
            y,
            &vec![1.0; y.len()],
            (0..x.len()).collect(),
            params,
            &mut rng,
        ));
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ServiceError> {
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| ServiceError::NotTrained("decision tree regressor".to_string()))?;
        check_width(x, tree.n_features())?;
        Ok(x.iter().map(|row| tree.leaf_value(row)[0]).collect())
    }
}

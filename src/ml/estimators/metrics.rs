//! Summary statistics, evaluation metrics and seeded sampling helpers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by n).
pub fn variance_population(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_population(values: &[f64]) -> f64 {
    variance_population(values).sqrt()
}

/// Sample standard deviation (divides by n - 1); 0 for fewer than two values.
pub fn std_sample(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let ss = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>();
    (ss / (values.len() - 1) as f64).sqrt()
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f64 / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination. A constant target scores 1 when predicted
/// exactly and 0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mu = mean(y_true);
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mu).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Mean absolute percentage error in percent, over non-zero targets only.
pub fn mean_absolute_percentage_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let ratios: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, _)| **t != 0.0)
        .map(|(t, p)| ((t - p) / t).abs())
        .collect();
    mean(&ratios) * 100.0
}

/// Least-squares slope of `values` against their index.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    num / den
}

/// Indices of each class, in class-id order.
fn indices_by_class(labels: &[usize]) -> Vec<Vec<usize>> {
    let n_classes = labels.iter().max().map_or(0, |max| max + 1);
    let mut groups = vec![Vec::new(); n_classes];
    for (idx, label) in labels.iter().enumerate() {
        groups[*label].push(idx);
    }
    groups
}

/// Seeded stratified train/test split returning sorted `(train, test)` indices.
///
/// Each class contributes `floor(count * test_size)` rows to the test side, at least
/// one when it has two or more rows, and always keeps one row for training.
pub fn stratified_split(
    labels: &[usize],
    test_size: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();

    for mut group in indices_by_class(labels) {
        if group.is_empty() {
            continue;
        }
        group.shuffle(rng);
        let count = group.len();
        let mut n_test = (count as f64 * test_size).floor() as usize;
        if count >= 2 {
            n_test = n_test.clamp(1, count - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&group[..n_test]);
        train.extend_from_slice(&group[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Seeded stratified k-fold returning `(train, validation)` index pairs.
///
/// Rows are dealt round-robin across folds class by class, with the fold cursor
/// carried between classes so every fold is non-empty whenever `labels.len() >= k`.
pub fn stratified_k_fold(
    labels: &[usize],
    k: usize,
    rng: &mut StdRng,
) -> Vec<(Vec<usize>, Vec<usize>)> {
    if k == 0 {
        return Vec::new();
    }
    let mut folds = vec![Vec::new(); k];
    let mut cursor = 0;
    for mut group in indices_by_class(labels) {
        group.shuffle(rng);
        for idx in group {
            folds[cursor % k].push(idx);
            cursor += 1;
        }
    }

    folds
        .iter()
        .enumerate()
        .filter(|(_, validation)| !validation.is_empty())
        .map(|(fold, validation)| {
            let mut train: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != fold)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            train.sort_unstable();
            let mut validation = validation.clone();
            validation.sort_unstable();
            (train, validation)
        })
        .collect()
}

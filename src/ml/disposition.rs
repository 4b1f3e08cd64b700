/*!
 * # Disposition Policy
 *
 * Learns which disposition a returned item should receive from labelled history and
 * turns classifier output into a full recommendation: action, confidence, recovered
 * value, environmental impact, processing estimate, marketplace and reasoning.
 */

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::estimators::metrics::{accuracy, mean, std_population, stratified_k_fold, stratified_split};
use super::estimators::{argmax, Classifier, ClassifierModel, ClassifierParams, LabelEncoder, StandardScaler};
use super::features::encode;
use super::valuation;
use crate::errors::{DispositionError, ServiceError};
use crate::models::ReturnRecord;

/// Recommendation for one returned item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub recommended_action: String,
    /// Highest class probability, in [0, 1]
    pub confidence: f64,
    pub estimated_value: f64,
    /// Kilograms of CO2
    pub co2_saved: f64,
    /// Kilograms
    pub landfill_avoided: f64,
    /// Whole days, at least 1
    pub processing_time: u32,
    /// Only present for resale
    pub marketplace: Option<String>,
    pub reasoning: String,
}

/// Holdout and cross-validation accuracy from the last training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub classes: Vec<String>,
}

/// Training knobs for the policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionSettings {
    pub algorithm: String,
    pub params: ClassifierParams,
    pub test_size: f64,
    pub cv_folds: usize,
}

impl Default for DispositionSettings {
    fn default() -> Self {
        Self {
            algorithm: "random_forest".to_string(),
            params: ClassifierParams::default(),
            test_size: 0.2,
            cv_folds: 5,
        }
    }
}

/// Everything needed to reproduce predictions after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedDisposition {
    labels: LabelEncoder,
    scaler: StandardScaler,
    model: ClassifierModel,
    metrics: ClassificationMetrics,
}

impl TrainedDisposition {
    pub fn metrics(&self) -> &ClassificationMetrics {
        &self.metrics
    }
}

#[derive(Debug, Clone)]
pub struct DispositionPolicy {
    settings: DispositionSettings,
    trained: Option<TrainedDisposition>,
}

impl DispositionPolicy {
    /// Creates an untrained policy, rejecting unknown classifier names up front.
    pub fn new(settings: DispositionSettings) -> Result<Self, ServiceError> {
        ClassifierModel::new(&settings.algorithm, settings.params)?;
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

    pub fn metrics(&self) -> Option<&ClassificationMetrics> {
        self.trained.as_ref().map(TrainedDisposition::metrics)
    }

    pub fn trained_state(&self) -> Option<&TrainedDisposition> {
        self.trained.as_ref()
    }

    pub fn restore(&mut self, state: Option<TrainedDisposition>) {
        self.trained = state;
    }

    /// Fits the classifier on `(record, label)` pairs and reports accuracy.
    ///
    /// The previous model stays in place if training fails.
    #[instrument(skip(self, records, labels), fields(samples = records.len()))]
    pub fn train(
        &mut self,
        records: &[ReturnRecord],
        labels: &[String],
    ) -> Result<ClassificationMetrics, DispositionError> {
        if records.len() != labels.len() {
            return Err(ServiceError::ValidationError(format!(
                "{} records but {} labels",
                records.len(),
                labels.len()
            )));
        }

        let mut encoder = LabelEncoder::new();
        let y = encoder.fit_transform(labels);
        if encoder.n_classes() < 2 {
            return Err(ServiceError::InsufficientData(format!(
                "disposition training needs at least 2 distinct labels, got {}",
                encoder.n_classes()
            )));
        }
        let n_classes = encoder.n_classes();
        let x: Vec<Vec<f64>> = records.iter().map(|record| encode(record).to_vec()).collect();

        let mut rng = StdRng::seed_from_u64(self.settings.params.seed);
        let (train_idx, test_idx) = stratified_split(&y, self.settings.test_size, &mut rng);
        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|i| x[*i].clone()).collect();
        let y_train: Vec<usize> = train_idx.iter().map(|i| y[*i]).collect();

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(&x_train)?;
        let mut model = ClassifierModel::new(&self.settings.algorithm, self.settings.params)?;
        model.fit(&x_train, &y_train, n_classes)?;

        let holdout_accuracy = if test_idx.is_empty() {
            accuracy(&y_train, &model.predict(&x_train)?)
        } else {
            let x_test: Vec<Vec<f64>> = test_idx.iter().map(|i| x[*i].clone()).collect();
            let y_test: Vec<usize> = test_idx.iter().map(|i| y[*i]).collect();
            accuracy(&y_test, &model.predict(&scaler.transform(&x_test)?)?)
        };

        let (cv_mean, cv_std) = self.cross_validate(&x_train, &y_train, n_classes, &mut rng)?;
        let cv_mean = cv_mean.unwrap_or(holdout_accuracy);

        let metrics = ClassificationMetrics {
            accuracy: holdout_accuracy,
            cv_mean,
            cv_std,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            classes: encoder.classes().to_vec(),
        };
        info!(
            accuracy = metrics.accuracy,
            cv_mean = metrics.cv_mean,
            cv_std = metrics.cv_std,
            classes = n_classes,
            "disposition model trained"
        );

        self.trained = Some(TrainedDisposition {
            labels: encoder,
            scaler,
            model,
            metrics: metrics.clone(),
        });
        Ok(metrics)
    }

    /// Stratified k-fold accuracy on the scaled training rows. Returns `None` for the
    /// mean when there are too few rows for two folds.
    fn cross_validate(
        &self,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        rng: &mut StdRng,
    ) -> Result<(Option<f64>, f64), ServiceError> {
        let k = self.settings.cv_folds.min(x.len());
        if k < 2 {
            return Ok((None, 0.0));
        }

        let mut scores = Vec::with_capacity(k);
        for (train, validation) in stratified_k_fold(y, k, rng) {
            let fold_x: Vec<Vec<f64>> = train.iter().map(|i| x[*i].clone()).collect();
            let fold_y: Vec<usize> = train.iter().map(|i| y[*i]).collect();
            let mut model = ClassifierModel::new(&self.settings.algorithm, self.settings.params)?;
            model.fit(&fold_x, &fold_y, n_classes)?;

            let val_x: Vec<Vec<f64>> = validation.iter().map(|i| x[*i].clone()).collect();
            let val_y: Vec<usize> = validation.iter().map(|i| y[*i]).collect();
            scores.push(accuracy(&val_y, &model.predict(&val_x)?));
        }
        debug!(folds = scores.len(), ?scores, "cross validation finished");

        Ok((Some(mean(&scores)), std_population(&scores)))
    }

    /// Recommends a disposition for one record.
    pub fn predict(&self, record: &ReturnRecord) -> Result<PredictionResult, DispositionError> {
        let trained = self
            .trained
            .as_ref()
            .ok_or_else(|| ServiceError::NotTrained("disposition model".to_string()))?;

        let scaled = trained.scaler.transform(&[encode(record).to_vec()])?;
        let probabilities = trained
            .model
            .predict_proba(&scaled)?
            .pop()
            .unwrap_or_default();

        let best = argmax(&probabilities);
        let confidence = probabilities.get(best).copied().unwrap_or_default();
        let action = trained
            .labels
            .inverse_transform(&[best])?
            .pop()
            .unwrap_or_default();

        let valuation = valuation::assess(record, &action);
        let reasoning = valuation::reasoning(record, &action, confidence);
        Ok(PredictionResult {
            recommended_action: action,
            confidence,
            estimated_value: valuation.estimated_value,
            co2_saved: valuation.co2_saved,
            landfill_avoided: valuation.landfill_avoided,
            processing_time: valuation.processing_time,
            marketplace: valuation.marketplace,
            reasoning,
        })
    }
}

//! Offline run orchestration.
//!
//! [`Trainer`] owns the [`TrainingConfig`] and drives the two offline modes:
//!
//! - **analyze**: grid-search an estimator on its training sessions, then
//!   report metrics of the best and the deployed parameters on the test set;
//! - **fit**: fit the deployed parameters on the training sessions and save
//!   the artifact set under `models_dir`.
//!
//! The scaler is always fitted on training features only.

use ndarray::{Array2, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wifi_ips_core::{FloorId, LocalProjection, PlanarPoint};

use crate::artifacts::ModelArtifacts;
use crate::config::{EstimatorConfig, EvaluationMode, TrainingConfig};
use crate::dataset::FingerprintDataset;
use crate::error::{TrainError, TrainResult};
use crate::features::{FeatureMatrix, LabeledSample};
use crate::ingest::discover_sessions;
use crate::knn::{Estimator, EstimatorRole, KnnClassifier, KnnParams, KnnRegressor};
use crate::metrics::EvaluationMetrics;
use crate::scaler::StandardScaler;
use crate::search::{holdout_split, GridSearch, SearchOutcome, SearchStrategy};

// ---------------------------------------------------------------------------
// Trainable
// ---------------------------------------------------------------------------

/// An [`Estimator`] whose labels can be read off pivoted samples.
pub trait Trainable: Estimator + Serialize + DeserializeOwned {
    fn labels(samples: &[LabeledSample], projection: &LocalProjection) -> Vec<Self::Label>;
}

impl Trainable for KnnRegressor {
    fn labels(samples: &[LabeledSample], projection: &LocalProjection) -> Vec<PlanarPoint> {
        samples.iter().map(|s| projection.project(s.location)).collect()
    }
}

impl Trainable for KnnClassifier {
    fn labels(samples: &[LabeledSample], _projection: &LocalProjection) -> Vec<FloorId> {
        samples.iter().map(|s| s.floor).collect()
    }
}

// ---------------------------------------------------------------------------
// AnalysisReport
// ---------------------------------------------------------------------------

/// Outcome of an analysis run for one estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub role: EstimatorRole,
    pub n_train: usize,
    pub n_test: usize,
    pub search: SearchOutcome,
    /// Test metrics of the best grid candidate.
    pub best_metrics: EvaluationMetrics,
    /// Parameters configured for deployment.
    pub deployed_params: KnnParams,
    /// Test metrics of the deployed parameters.
    pub deployed_metrics: EvaluationMetrics,
}

struct Split<L> {
    x_train: Array2<f64>,
    y_train: Vec<L>,
    x_test: Array2<f64>,
    y_test: Vec<L>,
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Drives the offline pipeline.
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Create a new `Trainer` from the given configuration.
    pub fn new(config: TrainingConfig) -> Self {
        Trainer { config }
    }

    /// Return a reference to the active configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Read every session under `data_dir` and build the dataset.
    pub fn prepare(&self) -> TrainResult<FingerprintDataset> {
        let sessions = discover_sessions(&self.config)?;
        if sessions.is_empty() {
            let dir = self.config.data_dir.display();
            return Err(TrainError::EmptyDataset(format!("sessions in {dir}")));
        }
        FingerprintDataset::build(&sessions, &self.config)
    }

    /// Grid-search and evaluate the estimator `E`.
    pub fn analyze<E: Trainable>(
        &self,
        dataset: &FingerprintDataset,
    ) -> TrainResult<AnalysisReport> {
        let cfg = self.config.estimator(E::ROLE);
        let split = self.split::<E>(dataset, cfg)?;

        let scaler = StandardScaler::fit(&split.x_train)?;
        let x_train = scaler.transform(&split.x_train)?;
        let x_test = scaler.transform(&split.x_test)?;

        let search = GridSearch::new(self.config.cv_folds).search::<E>(
            &cfg.grid,
            &x_train,
            &split.y_train,
        )?;

        let evaluate = |params: KnnParams| -> TrainResult<EvaluationMetrics> {
            let model = E::fit(params, &x_train, &split.y_train)?;
            let predicted = model.predict(&x_test)?;
            Ok(E::evaluate(&split.y_test, &predicted))
        };
        let best_metrics = evaluate(search.best_params)?;
        let deployed_metrics = evaluate(cfg.params)?;

        tracing::info!(
            role = %E::ROLE,
            train = split.y_train.len(),
            test = split.y_test.len(),
            best = %search.best_params,
            cv_score = search.best_score,
            "{best_metrics}"
        );
        tracing::info!(role = %E::ROLE, deployed = %cfg.params, "{deployed_metrics}");

        Ok(AnalysisReport {
            role: E::ROLE,
            n_train: split.y_train.len(),
            n_test: split.y_test.len(),
            search,
            best_metrics,
            deployed_params: cfg.params,
            deployed_metrics,
        })
    }

    /// Fit the deployed parameters of `E` and save the artifacts.
    pub fn fit<E: Trainable>(
        &self,
        dataset: &FingerprintDataset,
    ) -> TrainResult<ModelArtifacts<E>> {
        let cfg = self.config.estimator(E::ROLE);
        let rows = dataset.rows_matching(&cfg.train_sessions);
        let matrix = FeatureMatrix::build(&rows, dataset.universe());
        if matrix.is_empty() {
            return Err(TrainError::EmptyDataset(format!("{} training set", E::ROLE)));
        }
        let projection = dataset.projection();
        let labels = E::labels(&matrix.samples, &projection);

        let scaler = StandardScaler::fit(&matrix.features)?;
        let model = E::fit(cfg.params, &scaler.transform(&matrix.features)?, &labels)?;
        let artifacts = ModelArtifacts::new(
            cfg.prefix.clone(),
            model,
            scaler,
            dataset.universe().clone(),
            matrix.len(),
            Some(projection),
        )?;
        artifacts.save(&self.config.models_dir)?;
        Ok(artifacts)
    }

    fn split<E: Trainable>(
        &self,
        dataset: &FingerprintDataset,
        cfg: &EstimatorConfig,
    ) -> TrainResult<Split<E::Label>> {
        let universe = dataset.universe();
        let projection = dataset.projection();
        let train = FeatureMatrix::build(&dataset.rows_matching(&cfg.train_sessions), universe);
        let train_labels = E::labels(&train.samples, &projection);

        let split = match cfg.evaluation {
            EvaluationMode::Sessions => {
                let test =
                    FeatureMatrix::build(&dataset.rows_matching(&cfg.test_sessions), universe);
                let y_test = E::labels(&test.samples, &projection);
                Split {
                    x_train: train.features,
                    y_train: train_labels,
                    x_test: test.features,
                    y_test,
                }
            }
            EvaluationMode::Holdout { test_fraction, seed } => {
                let fold = holdout_split(train.len(), test_fraction, seed);
                Split {
                    x_train: train.features.select(Axis(0), &fold.train),
                    y_train: fold.train.iter().map(|&i| train_labels[i].clone()).collect(),
                    x_test: train.features.select(Axis(0), &fold.test),
                    y_test: fold.test.iter().map(|&i| train_labels[i].clone()).collect(),
                }
            }
        };

        if split.y_train.is_empty() {
            return Err(TrainError::EmptyDataset(format!("{} training set", E::ROLE)));
        }
        if split.y_test.is_empty() {
            return Err(TrainError::EmptyDataset(format!("{} test set", E::ROLE)));
        }
        Ok(split)
    }
}

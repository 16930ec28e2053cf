//! # WiFi IPS Train
//!
//! Offline half of the WiFi fingerprint positioning system. Capture
//! sessions go in, persisted k-NN models come out:
//!
//! ```text
//! ingest ──► trajectory ──► join ──► features ──► scaler ──► knn ──► artifacts
//!                                                   │
//!                                                search / metrics
//! ```
//!
//! ## Modules
//!
//! | Module        | Purpose                                                  |
//! |---------------|----------------------------------------------------------|
//! | [`config`]    | `TrainingConfig`, session filters, per-estimator blocks  |
//! | [`ingest`]    | Capture log and ground-truth readers                     |
//! | [`trajectory`]| Millisecond densification of position fixes              |
//! | [`join`]      | Position/scan temporal join                              |
//! | [`dataset`]   | Per-session processing and the fingerprint dataset       |
//! | [`features`]  | Column universe and vectorization                        |
//! | [`scaler`]    | Feature standardization                                  |
//! | [`knn`]       | `Estimator` trait, k-NN regressor and classifier         |
//! | [`search`]    | Grid search, k-fold and hold-out splits                  |
//! | [`metrics`]   | Position and floor metrics                               |
//! | [`artifacts`] | Saving and loading model sets                            |
//! | [`trainer`]   | Analyze and fit orchestration                            |
//! | [`error`]     | Error types                                              |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use wifi_ips_train::{config::TrainingConfig, knn::KnnRegressor, trainer::Trainer};
//!
//! let trainer = Trainer::new(TrainingConfig::default());
//! let dataset = trainer.prepare().unwrap();
//! trainer.fit::<KnnRegressor>(&dataset).unwrap();
//! ```

#![forbid(unsafe_code)]

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod ingest;
pub mod join;
pub mod knn;
pub mod metrics;
pub mod scaler;
pub mod search;
pub mod trainer;
pub mod trajectory;

pub use artifacts::{ModelArtifacts, ModelManifest};
pub use config::{EstimatorConfig, EvaluationMode, SessionFilter, TrainingConfig};
pub use error::{ConfigError, DatasetError, ModelError, TrainError, TrainResult};
pub use features::{vectorize, ColumnUniverse, FeatureMatrix, MISSING_RSS};
pub use knn::{DistanceMetric, Estimator, EstimatorRole, KnnClassifier, KnnParams, KnnRegressor};
pub use trainer::{AnalysisReport, Trainable, Trainer};
pub use trajectory::{interpolate, DenseTrajectory, InterpolationPolicy};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

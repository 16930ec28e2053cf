//! Error types for the offline fingerprint pipeline.
//!
//! ## Hierarchy
//!
//! ```text
//! TrainError (top-level)
//! ├── ConfigError   (config validation / file loading)
//! ├── DatasetError  (session files, record parsing)
//! └── ModelError    (fitting, prediction, artifact persistence)
//! ```
//!
//! Interpolation has its own non-fatal error in
//! [`crate::trajectory::InterpolationError`]; it never escapes the
//! interpolator.

use std::path::PathBuf;

use thiserror::Error;
use wifi_ips_core::{CoreError, StorageError};

// ---------------------------------------------------------------------------
// TrainResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used by orchestration-level functions.
pub type TrainResult<T> = Result<T, TrainError>;

// ---------------------------------------------------------------------------
// TrainError
// ---------------------------------------------------------------------------

/// Top-level error type for the offline pipeline.
#[derive(Debug, Error)]
pub enum TrainError {
    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A session file could not be read.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// A model could not be fitted, evaluated or persisted.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// The fingerprint store rejected a batch.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A core invariant failed (e.g. no reference points for a projection).
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// No labeled samples remained for a training or evaluation split.
    #[error("No samples available for {0}")]
    EmptyDataset(String),
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating a [`TrainingConfig`].
///
/// [`TrainingConfig`]: crate::config::TrainingConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file {path:?}: {source}")]
    FileRead {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue { field, reason: reason.into() }
    }
}

// ---------------------------------------------------------------------------
// DatasetError
// ---------------------------------------------------------------------------

/// Errors produced while reading capture sessions.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A session file or directory could not be read.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// One line of a session file was rejected.
    #[error("{path:?} line {line}: {source}")]
    MalformedRecord {
        /// File containing the record.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Field-level reason.
        #[source]
        source: CoreError,
    },

    /// The data directory does not exist.
    #[error("Data directory not found: {path:?}")]
    DirectoryNotFound {
        /// The missing path.
        path: PathBuf,
    },
}

impl DatasetError {
    /// Construct a [`DatasetError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io { path: path.into(), source }
    }
}

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Errors produced by estimators and model artifacts.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A feature vector was built against a different column universe than
    /// the one the model was trained on.
    #[error("Column universe mismatch: model expects {expected} columns, got {actual}")]
    ColumnUniverseMismatch {
        /// Column count of the trained model.
        expected: usize,
        /// Column count of the offered features.
        actual: usize,
    },

    /// A model artifact set could not be loaded or is inconsistent.
    #[error("Model '{prefix}' unavailable in {dir:?}: {reason}")]
    Unavailable {
        /// Directory searched.
        dir: PathBuf,
        /// Artifact prefix (e.g. `"2d"`, `"fd"`).
        prefix: String,
        /// What went wrong.
        reason: String,
    },

    /// Artifacts could not be written.
    #[error("Cannot write model artifact {path:?}: {reason}")]
    Persist {
        /// Target path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Fitting inputs disagree on the number of samples.
    #[error("Shape mismatch: {features} feature rows but {labels} labels")]
    ShapeMismatch {
        /// Feature matrix rows.
        features: usize,
        /// Label count.
        labels: usize,
    },

    /// Fitting on zero samples.
    #[error("Cannot fit an estimator on an empty training set")]
    EmptyTrainingSet,

    /// `n_neighbors` is zero or larger than the training set.
    #[error("n_neighbors = {k} is invalid for {samples} training samples")]
    InvalidNeighbors {
        /// Requested neighbor count.
        k: usize,
        /// Training set size.
        samples: usize,
    },

    /// A prediction had no neighbors to aggregate.
    #[error("No neighbors to aggregate (n_neighbors = {k})")]
    NoNeighbors {
        /// Neighbor count the model was configured with.
        k: usize,
    },

    /// A model returned no label for a single-row query.
    #[error("Model '{prefix}' returned no prediction")]
    EmptyPrediction {
        /// Artifact prefix of the model.
        prefix: String,
    },

    /// No grid-search candidate produced a finite score.
    #[error("Search produced no valid candidate")]
    NoValidCandidate,
}

impl ModelError {
    /// Construct a [`ModelError::Unavailable`].
    pub fn unavailable(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ModelError::Unavailable {
            dir: dir.into(),
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    /// Construct a [`ModelError::Persist`].
    pub fn persist(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ModelError::Persist {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

//! Offline pipeline configuration.
//!
//! [`TrainingConfig`] holds everything the `train` binary needs: where the
//! capture sessions live, how sessions are classified, and the split, grid
//! and deployed parameters of each estimator. It is built once at start-up
//! and passed down by reference.
//!
//! # Example
//!
//! ```rust
//! use wifi_ips_train::config::TrainingConfig;
//!
//! let cfg = TrainingConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.position.params.n_neighbors, 3);
//! assert_eq!(cfg.floor.prefix, "fd");
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use wifi_ips_core::{BuildingId, SessionId};

use crate::error::ConfigError;
use crate::knn::{EstimatorRole, KnnParams};
use crate::search::ParamGrid;
use crate::trajectory::InterpolationPolicy;

// ---------------------------------------------------------------------------
// SessionFilter
// ---------------------------------------------------------------------------

/// Substring filter over session names.
///
/// A session passes when it contains at least one `include` marker (or
/// `include` is empty) and none of the `exclude` markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl SessionFilter {
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, session: &SessionId) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|m| session.matches(m));
        included && !self.exclude.iter().any(|m| session.matches(m))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// How the analysis run obtains its test set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Train on `train_sessions`, test on `test_sessions`.
    Sessions,
    /// Shuffle the training samples and hold out a fraction.
    Holdout { test_fraction: f64, seed: u64 },
}

// ---------------------------------------------------------------------------
// EstimatorConfig
// ---------------------------------------------------------------------------

/// Configuration of one estimator (position or floor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Artifact file prefix, e.g. `"2d"`.
    pub prefix: String,
    /// Parameters of the deployed model.
    pub params: KnnParams,
    /// Grid explored by the analysis run.
    pub grid: ParamGrid,
    /// Sessions the model is fitted on.
    pub train_sessions: SessionFilter,
    /// Sessions the analysis run evaluates on.
    pub test_sessions: SessionFilter,
    /// Test-set strategy for the analysis run.
    pub evaluation: EvaluationMode,
}

impl EstimatorConfig {
    /// Defaults for `role`.
    ///
    /// The position model excludes floor-transition walks from training;
    /// the floor model keeps them and is evaluated on scoring walks.
    pub fn for_role(role: EstimatorRole) -> Self {
        let (train_sessions, test_sessions) = match role {
            EstimatorRole::Position => (
                SessionFilter::new(["TrainingTrial"], ["TrainingTrial5"]),
                SessionFilter::new(Vec::<String>::new(), ["TrainingTrial"]),
            ),
            EstimatorRole::Floor => (
                SessionFilter::new(["TrainingTrial"], Vec::<String>::new()),
                SessionFilter::new(["ScoringTrial"], Vec::<String>::new()),
            ),
        };
        Self {
            prefix: role.default_prefix().to_owned(),
            params: KnnParams::default(),
            grid: ParamGrid::default(),
            train_sessions,
            test_sessions,
            evaluation: EvaluationMode::Sessions,
        }
    }

    fn validate(&self, section: &'static str) -> Result<(), ConfigError> {
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::invalid_value(section, "prefix must not be empty"));
        }
        if self.params.n_neighbors == 0 {
            return Err(ConfigError::invalid_value(section, "params.n_neighbors must be > 0"));
        }
        if self.params.p == 0 {
            return Err(ConfigError::invalid_value(section, "params.p must be >= 1"));
        }
        if self.grid.is_empty() {
            return Err(ConfigError::invalid_value(
                section,
                "grid must have at least one candidate",
            ));
        }
        if self.grid.n_neighbors.contains(&0) || self.grid.p.contains(&0) {
            return Err(ConfigError::invalid_value(section, "grid values must be >= 1"));
        }
        if let EvaluationMode::Holdout { test_fraction, .. } = self.evaluation {
            if !(test_fraction > 0.0 && test_fraction < 1.0) {
                return Err(ConfigError::invalid_value(
                    section,
                    format!("holdout test_fraction must be in (0, 1), got {test_fraction}"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TrainingConfig
// ---------------------------------------------------------------------------

/// Complete configuration of an offline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------
    /// Directory walked for capture session files. Default: **`data`**.
    pub data_dir: PathBuf,

    /// Directory model artifacts are written to. Default: **`models`**.
    pub models_dir: PathBuf,

    /// Prefix marking ground-truth CSV files. Default: **`GT_`**.
    pub ground_truth_prefix: String,

    /// Building assigned to ground-truth fixes, which carry none.
    /// Default: **100**.
    pub ground_truth_building: BuildingId,

    // -----------------------------------------------------------------------
    // Session classification
    // -----------------------------------------------------------------------
    /// Sessions whose name contains this marker are training walks.
    /// Default: **`TrainingTrial`**.
    pub training_marker: String,

    /// Training walks that cross floors; they are densified with
    /// [`InterpolationPolicy::FloorAware`]. Default: **`["TrainingTrial5"]`**.
    pub floor_transition_markers: Vec<String>,

    // -----------------------------------------------------------------------
    // Estimators
    // -----------------------------------------------------------------------
    /// 2D position regressor.
    pub position: EstimatorConfig,

    /// Floor classifier.
    pub floor: EstimatorConfig,

    /// Cross-validation folds of the grid search. Default: **5**.
    pub cv_folds: usize,

    // -----------------------------------------------------------------------
    // Infrastructure
    // -----------------------------------------------------------------------
    /// Worker threads for per-session processing and search; `0` lets rayon
    /// decide. Default: **0**.
    pub num_workers: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            // Data
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            ground_truth_prefix: "GT_".to_owned(),
            ground_truth_building: BuildingId(100),
            // Session classification
            training_marker: "TrainingTrial".to_owned(),
            floor_transition_markers: vec!["TrainingTrial5".to_owned()],
            // Estimators
            position: EstimatorConfig::for_role(EstimatorRole::Position),
            floor: EstimatorConfig::for_role(EstimatorRole::Floor),
            cv_folds: 5,
            // Infrastructure
            num_workers: 0,
        }
    }
}

impl TrainingConfig {
    /// Load a [`TrainingConfig`] from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened and
    /// [`ConfigError::InvalidValue`] if the JSON is malformed or invalid.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: TrainingConfig = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::invalid_value("(file)", e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize this configuration to pretty-printed JSON at `path`,
    /// creating parent directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Configuration block of `role`.
    pub fn estimator(&self, role: EstimatorRole) -> &EstimatorConfig {
        match role {
            EstimatorRole::Position => &self.position,
            EstimatorRole::Floor => &self.floor,
        }
    }

    /// Interpolation policy for a training session.
    pub fn interpolation_policy(&self, session: &SessionId) -> InterpolationPolicy {
        if self.floor_transition_markers.iter().any(|m| session.matches(m)) {
            InterpolationPolicy::FloorAware
        } else {
            InterpolationPolicy::Unconditional
        }
    }

    /// Validate all fields and return the first problem found.
    ///
    /// # Validated invariants
    ///
    /// - `training_marker` and `ground_truth_prefix` are non-empty.
    /// - `cv_folds` is at least 2.
    /// - Each estimator has a prefix, positive parameters and a non-empty
    ///   grid; holdout fractions lie in `(0, 1)`.
    /// - The two estimators use distinct artifact prefixes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training_marker.trim().is_empty() {
            return Err(ConfigError::invalid_value("training_marker", "must not be empty"));
        }
        if self.ground_truth_prefix.is_empty() {
            return Err(ConfigError::invalid_value("ground_truth_prefix", "must not be empty"));
        }
        if self.cv_folds < 2 {
            return Err(ConfigError::invalid_value("cv_folds", "must be >= 2"));
        }
        self.position.validate("position")?;
        self.floor.validate("floor")?;
        if self.position.prefix == self.floor.prefix {
            return Err(ConfigError::invalid_value(
                "floor",
                format!("prefix '{}' is already used by the position model", self.floor.prefix),
            ));
        }
        Ok(())
    }
}

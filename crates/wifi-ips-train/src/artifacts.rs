//! Persisted model sets.
//!
//! A trained estimator is only usable together with the scaler fitted on its
//! training features and the column universe those features were built on.
//! [`ModelArtifacts`] keeps the three together and saves them side by side:
//!
//! ```text
//! <dir>/<prefix>_knn.json        fitted estimator
//! <dir>/<prefix>_scaler.json     StandardScaler
//! <dir>/<prefix>_columns.csv     column universe, one BSSID per line
//! <dir>/<prefix>_manifest.json   role, params, sizes, projection origin
//! ```
//!
//! Loading fails with [`ModelError::Unavailable`] unless all four files are
//! present and agree with each other.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wifi_ips_core::{LocalProjection, Measurement};

use crate::error::ModelError;
use crate::features::{unknown_count, vectorize, ColumnUniverse};
use crate::knn::{Estimator, EstimatorRole, KnnParams};
use crate::scaler::StandardScaler;

/// Descriptive metadata saved next to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub role: EstimatorRole,
    pub prefix: String,
    pub params: KnnParams,
    pub n_features: usize,
    pub n_samples: usize,
    /// Frame the position labels were projected into.
    pub projection: Option<LocalProjection>,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
}

/// An estimator with its scaler and column universe.
#[derive(Debug, Clone)]
pub struct ModelArtifacts<E> {
    model: E,
    scaler: StandardScaler,
    columns: ColumnUniverse,
    manifest: ModelManifest,
}

fn file_path(dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{prefix}_{suffix}"))
}

impl<E> ModelArtifacts<E>
where
    E: Estimator + Serialize + DeserializeOwned,
{
    /// Bundle a fitted model.
    ///
    /// # Errors
    ///
    /// [`ModelError::ColumnUniverseMismatch`] if the model, scaler and
    /// universe disagree on the number of columns.
    pub fn new(
        prefix: impl Into<String>,
        model: E,
        scaler: StandardScaler,
        columns: ColumnUniverse,
        n_samples: usize,
        projection: Option<LocalProjection>,
    ) -> Result<Self, ModelError> {
        check_widths(model.n_features(), scaler.n_features(), columns.len())?;
        let manifest = ModelManifest {
            role: E::ROLE,
            prefix: prefix.into(),
            params: model.params(),
            n_features: columns.len(),
            n_samples,
            projection,
            created_at: Utc::now(),
            crate_version: crate::VERSION.to_owned(),
        };
        Ok(Self { model, scaler, columns, manifest })
    }

    pub fn model(&self) -> &E {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn columns(&self) -> &ColumnUniverse {
        &self.columns
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    pub fn projection(&self) -> Option<LocalProjection> {
        self.manifest.projection
    }

    /// Predict from raw features that were built against `universe`.
    ///
    /// # Errors
    ///
    /// [`ModelError::ColumnUniverseMismatch`] unless `universe` is exactly
    /// the training universe.
    pub fn predict_features(
        &self,
        universe: &ColumnUniverse,
        features: &Array2<f64>,
    ) -> Result<Vec<E::Label>, ModelError> {
        if universe != &self.columns {
            return Err(ModelError::ColumnUniverseMismatch {
                expected: self.columns.len(),
                actual: universe.len(),
            });
        }
        let scaled = self.scaler.transform(features)?;
        self.model.predict(&scaled)
    }

    /// Vectorize, scale and predict one live scan.
    pub fn predict_measurements(
        &self,
        measurements: &[Measurement],
    ) -> Result<E::Label, ModelError> {
        let unknown = unknown_count(measurements.iter().map(|m| &m.bssid), &self.columns);
        if unknown > 0 {
            tracing::debug!(
                prefix = %self.manifest.prefix,
                unknown,
                "Dropping BSSIDs outside the column universe"
            );
        }
        let vector = vectorize(measurements.iter().map(|m| (m.bssid, m.rss)), &self.columns);
        let scaled = self.scaler.transform_row(vector.view())?;
        let row = scaled.insert_axis(Axis(0));
        self.model
            .predict(&row)?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::EmptyPrediction { prefix: self.manifest.prefix.clone() })
    }

    /// Write the artifact set into `dir`, creating it if necessary.
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        std::fs::create_dir_all(dir).map_err(|e| ModelError::persist(dir, e.to_string()))?;
        let prefix = &self.manifest.prefix;
        write_json(&file_path(dir, prefix, "knn.json"), &self.model)?;
        write_json(&file_path(dir, prefix, "scaler.json"), &self.scaler)?;
        let columns_path = file_path(dir, prefix, "columns.csv");
        std::fs::write(&columns_path, self.columns.to_csv())
            .map_err(|e| ModelError::persist(&columns_path, e.to_string()))?;
        write_json(&file_path(dir, prefix, "manifest.json"), &self.manifest)?;
        tracing::info!(
            dir = %dir.display(),
            prefix = %prefix,
            role = %self.manifest.role,
            columns = self.columns.len(),
            samples = self.manifest.n_samples,
            "Saved model artifacts"
        );
        Ok(())
    }

    /// Load and cross-check the artifact set `prefix` from `dir`.
    pub fn load(dir: &Path, prefix: &str) -> Result<Self, ModelError> {
        let unavailable = |reason: String| ModelError::unavailable(dir, prefix, reason);

        let path = |suffix: &str| file_path(dir, prefix, suffix);

        let manifest: ModelManifest = read_json(&path("manifest.json")).map_err(&unavailable)?;
        let model: E = read_json(&path("knn.json")).map_err(&unavailable)?;
        let scaler: StandardScaler = read_json(&path("scaler.json")).map_err(&unavailable)?;
        let columns_path = path("columns.csv");
        let text = std::fs::read_to_string(&columns_path)
            .map_err(|e| unavailable(format!("{}: {e}", columns_path.display())))?;
        let columns = ColumnUniverse::from_csv(&text).map_err(|e| unavailable(e.to_string()))?;

        if manifest.role != E::ROLE {
            return Err(unavailable(format!(
                "manifest describes a {} model, expected {}",
                manifest.role,
                E::ROLE
            )));
        }
        if manifest.params != model.params() {
            return Err(unavailable(format!(
                "manifest params {} differ from model params {}",
                manifest.params,
                model.params()
            )));
        }
        if manifest.n_features != columns.len() {
            return Err(unavailable(format!(
                "manifest expects {} columns, columns file has {}",
                manifest.n_features,
                columns.len()
            )));
        }
        check_widths(model.n_features(), scaler.n_features(), columns.len())
            .map_err(|e| unavailable(e.to_string()))?;
        if E::ROLE == EstimatorRole::Position && manifest.projection.is_none() {
            return Err(unavailable("position model has no projection origin".into()));
        }

        tracing::info!(
            dir = %dir.display(),
            prefix,
            role = %manifest.role,
            columns = columns.len(),
            "Loaded model artifacts"
        );
        Ok(Self { model, scaler, columns, manifest })
    }
}

fn check_widths(model: usize, scaler: usize, columns: usize) -> Result<(), ModelError> {
    if scaler != columns {
        return Err(ModelError::ColumnUniverseMismatch { expected: columns, actual: scaler });
    }
    if model != columns {
        return Err(ModelError::ColumnUniverseMismatch { expected: columns, actual: model });
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let json = serde_json::to_string(value).map_err(|e| ModelError::persist(path, e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ModelError::persist(path, e.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

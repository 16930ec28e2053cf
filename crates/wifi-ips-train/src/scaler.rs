//! Per-column standardization of fingerprint features.
//!
//! The scaler is fitted once, on training features only, and then travels
//! with the model. Evaluation and live features are only ever passed through
//! [`StandardScaler::transform`].

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Fitted mean and scale of every feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Compute column means and population standard deviations.
    ///
    /// Constant columns get a scale of `1.0` so they map to zero instead of
    /// dividing by zero.
    pub fn fit(features: &Array2<f64>) -> Result<Self, ModelError> {
        if features.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        let mean = features.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
        let scale = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s <= f64::EPSILON { 1.0 } else { s });
        Ok(Self { mean, scale })
    }

    /// Number of columns the scaler was fitted on.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize every row of `features`.
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        self.check(features.ncols())?;
        Ok((features - &self.mean) / &self.scale)
    }

    /// Standardize a single row.
    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> Result<Array1<f64>, ModelError> {
        self.check(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    fn check(&self, actual: usize) -> Result<(), ModelError> {
        if actual != self.n_features() {
            return Err(ModelError::ColumnUniverseMismatch {
                expected: self.n_features(),
                actual,
            });
        }
        Ok(())
    }
}

//! Evaluation metrics for position and floor estimators.
//!
//! - [`mean_euclidean_error`]: mean planar distance between truth and
//!   prediction, in metres. Reported under the name "MAE" by the analysis
//!   logs even though it is a Euclidean, not an absolute, error.
//! - [`root_mean_squared_error`]: `sqrt(mean((y - ŷ)²))` over every
//!   coordinate of every sample.
//! - [`accuracy`]: fraction of exact label matches.
//!
//! All functions return `0.0` for empty input.

use std::fmt;

use serde::{Deserialize, Serialize};
use wifi_ips_core::PlanarPoint;

/// Metrics of one held-out evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationMetrics {
    Position { mean_error_m: f64, rmse_m: f64 },
    Floor { accuracy: f64 },
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position { mean_error_m, rmse_m } => {
                write!(f, "MAE = {mean_error_m:.3} m, RMSE = {rmse_m:.3} m")
            }
            Self::Floor { accuracy } => write!(f, "accuracy = {:.2}%", accuracy * 100.0),
        }
    }
}

/// Mean Euclidean distance between paired points.
pub fn mean_euclidean_error(truth: &[PlanarPoint], predicted: &[PlanarPoint]) -> f64 {
    mean(truth.iter().zip(predicted).map(|(t, p)| t.distance(p)))
}

/// Mean of squared coordinate differences over both axes.
pub fn mean_squared_error(truth: &[PlanarPoint], predicted: &[PlanarPoint]) -> f64 {
    mean(
        truth
            .iter()
            .zip(predicted)
            .flat_map(|(t, p)| [(t.x - p.x).powi(2), (t.y - p.y).powi(2)]),
    )
}

/// Square root of [`mean_squared_error`].
pub fn root_mean_squared_error(truth: &[PlanarPoint], predicted: &[PlanarPoint]) -> f64 {
    mean_squared_error(truth, predicted).sqrt()
}

/// Fraction of positions where `truth[i] == predicted[i]`.
pub fn accuracy<T: PartialEq>(truth: &[T], predicted: &[T]) -> f64 {
    mean(truth.iter().zip(predicted).map(|(t, p)| if t == p { 1.0 } else { 0.0 }))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use wifi_ips_core::FloorId;

    #[test]
    fn mean_euclidean_error_uses_planar_distance() {
        let truth = [PlanarPoint::new(0.0, 0.0), PlanarPoint::new(1.0, 1.0)];
        let pred = [PlanarPoint::new(3.0, 4.0), PlanarPoint::new(1.0, 1.0)];
        assert_relative_eq!(mean_euclidean_error(&truth, &pred), 2.5);
    }

    #[test]
    fn rmse_averages_over_all_coordinates() {
        let truth = [PlanarPoint::new(0.0, 0.0)];
        let pred = [PlanarPoint::new(3.0, 4.0)];
        // (9 + 16) / 2 = 12.5
        assert_relative_eq!(mean_squared_error(&truth, &pred), 12.5);
        assert_relative_eq!(root_mean_squared_error(&truth, &pred), 12.5f64.sqrt());
    }

    #[test]
    fn accuracy_counts_exact_matches() {
        let truth = [FloorId(0), FloorId(1), FloorId(2), FloorId(2)];
        let pred = [FloorId(0), FloorId(2), FloorId(2), FloorId(2)];
        assert_relative_eq!(accuracy(&truth, &pred), 0.75);
    }

    #[test]
    fn empty_inputs_yield_zero() {
        assert_eq!(mean_euclidean_error(&[], &[]), 0.0);
        assert_eq!(accuracy::<FloorId>(&[], &[]), 0.0);
    }

    #[test]
    fn display_reports_units() {
        let m = EvaluationMetrics::Floor { accuracy: 0.5 };
        assert_eq!(m.to_string(), "accuracy = 50.00%");
    }
}

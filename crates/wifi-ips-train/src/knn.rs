//! Brute-force k-nearest-neighbor estimators.
//!
//! Both estimators implement [`Estimator`]: [`KnnRegressor`] predicts a
//! [`PlanarPoint`] as the mean of its neighbors' labels, [`KnnClassifier`]
//! predicts a [`FloorId`] by majority vote. Neighbors are ranked by
//! `(distance, training index)` so predictions are fully deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wifi_ips_core::{FloorId, PlanarPoint};

use crate::error::ModelError;
use crate::metrics::{self, EvaluationMetrics};

// ---------------------------------------------------------------------------
// DistanceMetric / KnnParams
// ---------------------------------------------------------------------------

/// Distance used to rank neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
    Chebyshev,
    /// Minkowski distance of order [`KnnParams::p`].
    Minkowski,
}

impl DistanceMetric {
    /// Distance between `a` and `b`. `p` only affects [`Self::Minkowski`].
    pub fn distance(self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, p: u32) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
        match self {
            Self::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Self::Manhattan => diffs.sum(),
            Self::Chebyshev => diffs.fold(0.0, f64::max),
            Self::Minkowski => match p {
                1 => diffs.sum(),
                2 => diffs.map(|d| d * d).sum::<f64>().sqrt(),
                _ => {
                    let p = f64::from(p);
                    diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p)
                }
            },
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Chebyshev => "chebyshev",
            Self::Minkowski => "minkowski",
        };
        f.write_str(name)
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Self::Euclidean),
            "manhattan" => Ok(Self::Manhattan),
            "chebyshev" => Ok(Self::Chebyshev),
            "minkowski" => Ok(Self::Minkowski),
            other => Err(format!("unknown distance metric '{other}'")),
        }
    }
}

fn default_p() -> u32 {
    2
}

/// Hyper-parameters of a k-NN estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnnParams {
    /// Number of neighbors consulted per prediction.
    pub n_neighbors: usize,
    /// Distance used to rank neighbors.
    pub metric: DistanceMetric,
    /// Minkowski order. Default: **2**.
    #[serde(default = "default_p")]
    pub p: u32,
}

impl KnnParams {
    pub fn new(n_neighbors: usize, metric: DistanceMetric) -> Self {
        Self { n_neighbors, metric, p: default_p() }
    }

    pub fn with_p(mut self, p: u32) -> Self {
        self.p = p;
        self
    }
}

impl Default for KnnParams {
    /// The deployed configuration: 3 neighbors, Manhattan distance.
    fn default() -> Self {
        Self::new(3, DistanceMetric::Manhattan)
    }
}

impl fmt::Display for KnnParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_neighbors={} metric={} p={}", self.n_neighbors, self.metric, self.p)
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Which estimator a configuration block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorRole {
    /// 2D coordinates in the local metric frame.
    Position,
    /// Floor number.
    Floor,
}

impl EstimatorRole {
    /// Conventional artifact prefix for the role.
    pub fn default_prefix(self) -> &'static str {
        match self {
            Self::Position => "2d",
            Self::Floor => "fd",
        }
    }
}

impl fmt::Display for EstimatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position => f.write_str("position"),
            Self::Floor => f.write_str("floor"),
        }
    }
}

/// A supervised estimator over fingerprint feature rows.
pub trait Estimator: Sized + Send + Sync {
    /// Label predicted per feature row.
    type Label: Clone + Send + Sync + fmt::Debug;

    /// Role this estimator fulfils.
    const ROLE: EstimatorRole;

    /// Fit a model on `features` (one row per sample) and `labels`.
    fn fit(
        params: KnnParams,
        features: &Array2<f64>,
        labels: &[Self::Label],
    ) -> Result<Self, ModelError>;

    /// Predict one label per row of `features`.
    ///
    /// # Errors
    ///
    /// [`ModelError::ColumnUniverseMismatch`] if the column count differs
    /// from the training features.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<Self::Label>, ModelError>;

    /// Selection score, higher is better.
    fn score(truth: &[Self::Label], predicted: &[Self::Label]) -> f64;

    /// Report metrics for a held-out evaluation.
    fn evaluate(truth: &[Self::Label], predicted: &[Self::Label]) -> EvaluationMetrics;

    /// Parameters the model was fitted with.
    fn params(&self) -> KnnParams;

    /// Number of feature columns the model expects.
    fn n_features(&self) -> usize;
}

// ---------------------------------------------------------------------------
// NeighborIndex
// ---------------------------------------------------------------------------

/// Stored training rows plus the ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NeighborIndex {
    features: Array2<f64>,
    params: KnnParams,
}

impl NeighborIndex {
    fn build(
        params: KnnParams,
        features: &Array2<f64>,
        n_labels: usize,
    ) -> Result<Self, ModelError> {
        let samples = features.nrows();
        if samples == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if samples != n_labels {
            return Err(ModelError::ShapeMismatch { features: samples, labels: n_labels });
        }
        if params.n_neighbors == 0 || params.n_neighbors > samples {
            return Err(ModelError::InvalidNeighbors { k: params.n_neighbors, samples });
        }
        Ok(Self { features: features.clone(), params })
    }

    fn check_columns(&self, features: &Array2<f64>) -> Result<(), ModelError> {
        if features.ncols() != self.features.ncols() {
            return Err(ModelError::ColumnUniverseMismatch {
                expected: self.features.ncols(),
                actual: features.ncols(),
            });
        }
        Ok(())
    }

    /// Indices of the `k` nearest training rows, nearest first.
    fn neighbors(&self, query: ArrayView1<'_, f64>) -> Vec<usize> {
        let KnnParams { n_neighbors, metric, p } = self.params;
        if n_neighbors == 0 {
            return Vec::new();
        }
        let mut ranked: Vec<(f64, usize)> = self
            .features
            .outer_iter()
            .enumerate()
            .map(|(i, row)| (metric.distance(row, query, p), i))
            .collect();
        let by_rank = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if n_neighbors < ranked.len() {
            ranked.select_nth_unstable_by(n_neighbors - 1, by_rank);
            ranked.truncate(n_neighbors);
        }
        ranked.sort_unstable_by(by_rank);
        ranked.into_iter().map(|(_, i)| i).collect()
    }

    /// Reduce the neighbors of every row. `reduce` is never called with an
    /// empty neighbor set; such a row fails with [`ModelError::NoNeighbors`].
    fn predict_rows<L, F>(&self, features: &Array2<f64>, reduce: F) -> Result<Vec<L>, ModelError>
    where
        L: Send,
        F: Fn(&[usize]) -> Option<L> + Sync,
    {
        self.check_columns(features)?;
        (0..features.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = self.neighbors(features.row(i));
                if neighbors.is_empty() {
                    return Err(ModelError::NoNeighbors { k: self.params.n_neighbors });
                }
                reduce(&neighbors).ok_or(ModelError::NoNeighbors { k: self.params.n_neighbors })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// KnnRegressor
// ---------------------------------------------------------------------------

/// k-NN regressor over planar coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    index: NeighborIndex,
    targets: Vec<PlanarPoint>,
}

impl Estimator for KnnRegressor {
    type Label = PlanarPoint;
    const ROLE: EstimatorRole = EstimatorRole::Position;

    fn fit(
        params: KnnParams,
        features: &Array2<f64>,
        labels: &[PlanarPoint],
    ) -> Result<Self, ModelError> {
        let index = NeighborIndex::build(params, features, labels.len())?;
        Ok(Self { index, targets: labels.to_vec() })
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<PlanarPoint>, ModelError> {
        self.index.predict_rows(features, |neighbors| {
            let n = neighbors.len() as f64;
            let (sx, sy) = neighbors
                .iter()
                .map(|&i| self.targets[i])
                .fold((0.0, 0.0), |(sx, sy), t| (sx + t.x, sy + t.y));
            Some(PlanarPoint::new(sx / n, sy / n))
        })
    }

    fn score(truth: &[PlanarPoint], predicted: &[PlanarPoint]) -> f64 {
        -metrics::mean_squared_error(truth, predicted)
    }

    fn evaluate(truth: &[PlanarPoint], predicted: &[PlanarPoint]) -> EvaluationMetrics {
        EvaluationMetrics::Position {
            mean_error_m: metrics::mean_euclidean_error(truth, predicted),
            rmse_m: metrics::root_mean_squared_error(truth, predicted),
        }
    }

    fn params(&self) -> KnnParams {
        self.index.params
    }

    fn n_features(&self) -> usize {
        self.index.features.ncols()
    }
}

// ---------------------------------------------------------------------------
// KnnClassifier
// ---------------------------------------------------------------------------

/// k-NN floor classifier. Ties in the vote go to the lowest floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    index: NeighborIndex,
    labels: Vec<FloorId>,
}

impl KnnClassifier {
    /// Distinct floors seen during fitting, ascending.
    pub fn classes(&self) -> Vec<FloorId> {
        let mut classes = self.labels.clone();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

impl Estimator for KnnClassifier {
    type Label = FloorId;
    const ROLE: EstimatorRole = EstimatorRole::Floor;

    fn fit(
        params: KnnParams,
        features: &Array2<f64>,
        labels: &[FloorId],
    ) -> Result<Self, ModelError> {
        let index = NeighborIndex::build(params, features, labels.len())?;
        Ok(Self { index, labels: labels.to_vec() })
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<FloorId>, ModelError> {
        self.index.predict_rows(features, |neighbors| {
            let mut votes: BTreeMap<FloorId, usize> = BTreeMap::new();
            for &i in neighbors {
                *votes.entry(self.labels[i]).or_default() += 1;
            }
            // BTreeMap iterates ascending, so the first maximum is the lowest floor.
            votes
                .into_iter()
                .fold(None, |best: Option<(FloorId, usize)>, (floor, count)| match best {
                    Some((_, c)) if c >= count => best,
                    _ => Some((floor, count)),
                })
                .map(|(floor, _)| floor)
        })
    }

    fn score(truth: &[FloorId], predicted: &[FloorId]) -> f64 {
        metrics::accuracy(truth, predicted)
    }

    fn evaluate(truth: &[FloorId], predicted: &[FloorId]) -> EvaluationMetrics {
        EvaluationMetrics::Floor {
            accuracy: metrics::accuracy(truth, predicted),
        }
    }

    fn params(&self) -> KnnParams {
        self.index.params
    }

    fn n_features(&self) -> usize {
        self.index.features.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn metrics_agree_on_simple_vectors() {
        let a = Array1::from(vec![0.0, 0.0]);
        let b = Array1::from(vec![3.0, 4.0]);
        assert_relative_eq!(DistanceMetric::Euclidean.distance(a.view(), b.view(), 2), 5.0);
        assert_relative_eq!(DistanceMetric::Manhattan.distance(a.view(), b.view(), 2), 7.0);
        assert_relative_eq!(DistanceMetric::Chebyshev.distance(a.view(), b.view(), 2), 4.0);
        assert_relative_eq!(DistanceMetric::Minkowski.distance(a.view(), b.view(), 1), 7.0);
        assert_relative_eq!(DistanceMetric::Minkowski.distance(a.view(), b.view(), 2), 5.0);
        assert_relative_eq!(
            DistanceMetric::Minkowski.distance(a.view(), b.view(), 3),
            (27.0f64 + 64.0).powf(1.0 / 3.0)
        );
    }

    #[test]
    fn metric_parses_case_insensitively() {
        assert_eq!("Manhattan".parse::<DistanceMetric>().unwrap(), DistanceMetric::Manhattan);
        assert!("cosine".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn regressor_averages_nearest_labels() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let y = vec![
            PlanarPoint::new(0.0, 0.0),
            PlanarPoint::new(2.0, 2.0),
            PlanarPoint::new(100.0, 100.0),
            PlanarPoint::new(102.0, 102.0),
        ];
        let params = KnnParams::new(2, DistanceMetric::Euclidean);
        let model = KnnRegressor::fit(params, &x, &y).unwrap();
        let pred = model.predict(&array![[0.4], [10.6]]).unwrap();
        assert_eq!(pred[0], PlanarPoint::new(1.0, 1.0));
        assert_eq!(pred[1], PlanarPoint::new(101.0, 101.0));
    }

    #[test]
    fn classifier_breaks_ties_towards_lowest_floor() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = vec![FloorId(2), FloorId(1), FloorId(2), FloorId(1)];
        let params = KnnParams::new(2, DistanceMetric::Manhattan);
        let model = KnnClassifier::fit(params, &x, &y).unwrap();
        let pred = model.predict(&array![[0.5]]).unwrap();
        assert_eq!(pred, vec![FloorId(1)]);
        assert_eq!(model.classes(), vec![FloorId(1), FloorId(2)]);
    }

    #[test]
    fn equidistant_neighbors_rank_by_training_index() {
        let x = array![[1.0], [-1.0], [1.0]];
        let y: Vec<_> = [1.0, 2.0, 3.0].map(|v| PlanarPoint::new(v, 0.0)).to_vec();
        let params = KnnParams::new(1, DistanceMetric::Euclidean);
        let model = KnnRegressor::fit(params, &x, &y).unwrap();
        let first = model.predict(&array![[0.0]]).unwrap();
        let second = model.predict(&array![[0.0]]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], PlanarPoint::new(1.0, 0.0));
    }

    #[test]
    fn fit_validates_inputs() {
        let x = array![[0.0], [1.0]];
        let labels = vec![FloorId(0)];
        assert!(matches!(
            KnnClassifier::fit(KnnParams::default(), &x, &labels),
            Err(ModelError::ShapeMismatch { .. })
        ));
        let too_many = KnnParams::new(3, DistanceMetric::Euclidean);
        assert!(matches!(
            KnnClassifier::fit(too_many, &x, &[FloorId(0), FloorId(1)]),
            Err(ModelError::InvalidNeighbors { k: 3, samples: 2 })
        ));
        let empty = Array2::<f64>::zeros((0, 1));
        assert!(matches!(
            KnnClassifier::fit(KnnParams::default(), &empty, &[]),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn predict_rejects_wrong_column_count() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let params = KnnParams::new(1, DistanceMetric::Euclidean);
        let model = KnnClassifier::fit(params, &x, &[FloorId(0), FloorId(1)]).unwrap();
        let err = model.predict(&array![[0.0, 1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, ModelError::ColumnUniverseMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn zero_neighbors_is_an_error_not_a_floor() {
        let x = array![[0.0], [1.0]];
        let params = KnnParams::new(1, DistanceMetric::Euclidean);
        let model = KnnClassifier::fit(params, &x, &[FloorId(4), FloorId(5)]).unwrap();

        // A hand-edited model file can carry an n_neighbors that fit rejects.
        let mut json = serde_json::to_value(&model).unwrap();
        json["index"]["params"]["n_neighbors"] = serde_json::json!(0);
        let broken: KnnClassifier = serde_json::from_value(json).unwrap();
        let err = broken.predict(&array![[0.2]]).unwrap_err();
        assert!(matches!(err, ModelError::NoNeighbors { k: 0 }));

        let regressor = KnnRegressor::fit(params, &x, &[PlanarPoint::new(0.0, 0.0); 2]).unwrap();
        let mut json = serde_json::to_value(&regressor).unwrap();
        json["index"]["params"]["n_neighbors"] = serde_json::json!(0);
        let broken: KnnRegressor = serde_json::from_value(json).unwrap();
        assert!(matches!(broken.predict(&array![[0.2]]), Err(ModelError::NoNeighbors { k: 0 })));
    }

    #[test]
    fn default_params_match_deployment() {
        let params = KnnParams::default();
        assert_eq!(params.n_neighbors, 3);
        assert_eq!(params.metric, DistanceMetric::Manhattan);
    }
}

//! Hyper-parameter search and data splitting.
//!
//! [`SearchStrategy`] is the seam between the trainer and whatever picks the
//! k-NN configuration. [`GridSearch`] is the exhaustive, cross-validated
//! implementation; candidates are scored in parallel and the best mean score
//! wins, ties going to the earliest candidate in grid order.

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::knn::{DistanceMetric, Estimator, KnnParams};

// ---------------------------------------------------------------------------
// ParamGrid
// ---------------------------------------------------------------------------

/// Cartesian grid of k-NN parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_neighbors: Vec<usize>,
    pub metrics: Vec<DistanceMetric>,
    pub p: Vec<u32>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_neighbors: vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17],
            metrics: vec![
                DistanceMetric::Euclidean,
                DistanceMetric::Manhattan,
                DistanceMetric::Chebyshev,
                DistanceMetric::Minkowski,
            ],
            p: vec![1, 2],
        }
    }
}

impl ParamGrid {
    /// Every combination, in `n_neighbors`-major order.
    pub fn candidates(&self) -> Vec<KnnParams> {
        let size = self.n_neighbors.len() * self.metrics.len() * self.p.len();
        let mut out = Vec::with_capacity(size);
        for &k in &self.n_neighbors {
            for &metric in &self.metrics {
                for &p in &self.p {
                    out.push(KnnParams { n_neighbors: k, metric, p });
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.n_neighbors.is_empty() || self.metrics.is_empty() || self.p.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Score of one grid candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: KnnParams,
    /// Mean fold score, or `None` if some fold could not be fitted.
    pub mean_score: Option<f64>,
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best_params: KnnParams,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Picks estimator parameters from a grid.
pub trait SearchStrategy: Send + Sync {
    fn search<E: Estimator>(
        &self,
        grid: &ParamGrid,
        features: &Array2<f64>,
        labels: &[E::Label],
    ) -> Result<SearchOutcome, ModelError>;
}

/// Exhaustive k-fold cross-validated grid search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSearch {
    pub folds: usize,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self { folds: 5 }
    }
}

impl GridSearch {
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    fn score_candidate<E: Estimator>(
        params: KnnParams,
        features: &Array2<f64>,
        labels: &[E::Label],
        folds: &[Fold],
    ) -> Option<f64> {
        let mut total = 0.0;
        for fold in folds {
            let x_train = features.select(Axis(0), &fold.train);
            let y_train: Vec<E::Label> = fold.train.iter().map(|&i| labels[i].clone()).collect();
            let model = E::fit(params, &x_train, &y_train).ok()?;
            let x_test = features.select(Axis(0), &fold.test);
            let y_test: Vec<E::Label> = fold.test.iter().map(|&i| labels[i].clone()).collect();
            let predicted = model.predict(&x_test).ok()?;
            total += E::score(&y_test, &predicted);
        }
        Some(total / folds.len() as f64)
    }
}

impl SearchStrategy for GridSearch {
    fn search<E: Estimator>(
        &self,
        grid: &ParamGrid,
        features: &Array2<f64>,
        labels: &[E::Label],
    ) -> Result<SearchOutcome, ModelError> {
        if features.nrows() != labels.len() {
            return Err(ModelError::ShapeMismatch {
                features: features.nrows(),
                labels: labels.len(),
            });
        }
        let folds = k_fold(labels.len(), self.folds);
        if folds.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let candidates: Vec<CandidateScore> = grid
            .candidates()
            .into_par_iter()
            .map(|params| CandidateScore {
                params,
                mean_score: Self::score_candidate::<E>(params, features, labels, &folds),
            })
            .collect();

        let mut best: Option<(KnnParams, f64)> = None;
        for c in &candidates {
            if let Some(score) = c.mean_score.filter(|s| s.is_finite()) {
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((c.params, score));
                }
            }
        }
        let (best_params, best_score) = best.ok_or(ModelError::NoValidCandidate)?;

        tracing::info!(
            role = %E::ROLE,
            candidates = candidates.len(),
            folds = folds.len(),
            best = %best_params,
            best_score,
            "Grid search finished"
        );
        Ok(SearchOutcome { best_params, best_score, candidates })
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Train and test row indices of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous, unshuffled k-fold split of `n` rows.
///
/// The first `n % k` folds get one extra row. Returns no folds when fewer
/// than two rows or two folds are available.
pub fn k_fold(n: usize, k: usize) -> Vec<Fold> {
    let k = k.min(n);
    if k < 2 {
        return Vec::new();
    }
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|f| {
            let size = base + usize::from(f < extra);
            let test: Vec<usize> = (start..start + size).collect();
            let train: Vec<usize> = (0..start).chain(start + size..n).collect();
            start += size;
            Fold { train, test }
        })
        .collect()
}

/// Shuffled hold-out split with `test_fraction` of the rows in the test set.
pub fn holdout_split(n: usize, test_fraction: f64, seed: u64) -> Fold {
    let mut indices: Vec<usize> = (0..n).collect();
    xorshift_shuffle(&mut indices, seed);
    let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let test = indices[..n_test.min(n)].to_vec();
    let train = indices[n_test.min(n)..].to_vec();
    Fold { train, test }
}

/// In-place Fisher-Yates shuffle driven by a 64-bit xorshift generator.
fn xorshift_shuffle(indices: &mut [usize], seed: u64) {
    let n = indices.len();
    if n <= 1 {
        return;
    }
    let mut state = if seed == 0 { 0x853c49e6748fea9b } else { seed };
    for i in (1..n).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state as usize) % (i + 1);
        indices.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knn::{KnnClassifier, KnnRegressor};
    use ndarray::Array2;
    use wifi_ips_core::{FloorId, PlanarPoint};

    #[test]
    fn default_grid_has_all_combinations() {
        let grid = ParamGrid::default();
        assert_eq!(grid.candidates().len(), 14 * 4 * 2);
        let first = KnnParams { n_neighbors: 1, metric: DistanceMetric::Euclidean, p: 1 };
        assert_eq!(grid.candidates()[0], first);
    }

    #[test]
    fn k_fold_partitions_rows() {
        let folds = k_fold(11, 5);
        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0].test, vec![0, 1, 2]);
        assert_eq!(folds[4].test, vec![9, 10]);
        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..11).collect::<Vec<_>>());
        for f in &folds {
            assert_eq!(f.train.len() + f.test.len(), 11);
        }
        assert!(k_fold(1, 5).is_empty());
    }

    #[test]
    fn holdout_is_deterministic_permutation() {
        let a = holdout_split(20, 0.2, 42);
        let b = holdout_split(20, 0.2, 42);
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 4);
        let mut all: Vec<usize> = a.train.iter().chain(&a.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    /// Two well-separated clusters: floor 0 near the origin, floor 1 far away.
    fn clusters() -> (Array2<f64>, Vec<FloorId>) {
        let n = 20;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let base = if i % 2 == 0 { 0.0 } else { 100.0 };
            base + (i * 3 + j) as f64 * 0.1
        });
        let y = (0..n).map(|i| FloorId((i % 2) as i32)).collect();
        (x, y)
    }

    #[test]
    fn classifier_search_finds_perfect_accuracy() {
        let (x, y) = clusters();
        let grid = ParamGrid {
            n_neighbors: vec![1, 3],
            metrics: vec![DistanceMetric::Manhattan],
            p: vec![2],
        };
        let outcome = GridSearch::default().search::<KnnClassifier>(&grid, &x, &y).unwrap();
        assert_eq!(outcome.best_score, 1.0);
        // Both candidates are perfect; the earliest wins.
        assert_eq!(outcome.best_params.n_neighbors, 1);
        assert_eq!(outcome.candidates.len(), 2);
    }

    #[test]
    fn oversized_k_is_scored_as_invalid() {
        let (x, y) = clusters();
        let grid = ParamGrid {
            n_neighbors: vec![1, 50],
            metrics: vec![DistanceMetric::Euclidean],
            p: vec![2],
        };
        let outcome = GridSearch::default().search::<KnnClassifier>(&grid, &x, &y).unwrap();
        assert_eq!(outcome.candidates[1].mean_score, None);
        assert_eq!(outcome.best_params.n_neighbors, 1);
    }

    #[test]
    fn regressor_search_prefers_lower_error() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y: Vec<PlanarPoint> = (0..12).map(|i| PlanarPoint::new(i as f64, 0.0)).collect();
        let grid = ParamGrid {
            n_neighbors: vec![1, 5],
            metrics: vec![DistanceMetric::Euclidean],
            p: vec![2],
        };
        let outcome = GridSearch::new(3).search::<KnnRegressor>(&grid, &x, &y).unwrap();
        assert!(outcome.best_score <= 0.0);
        let k1 = outcome.candidates[0].mean_score.unwrap();
        let k5 = outcome.candidates[1].mean_score.unwrap();
        assert_eq!(outcome.best_score, k1.max(k5));
    }

    #[test]
    fn search_rejects_mismatched_labels() {
        let x = Array2::zeros((3, 1));
        let err = GridSearch::default()
            .search::<KnnClassifier>(&ParamGrid::default(), &x, &[FloorId(0)])
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }
}

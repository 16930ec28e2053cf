//! Live position estimation from a WiFi scan.
//!
//! Holds the position and floor artifact sets, loaded read-only at start-up,
//! and turns one scan into a [`PositionEstimate`]. The position model
//! predicts in the local metric frame; the result is mapped back to
//! latitude and longitude with the projection saved alongside it.

use std::path::Path;

use serde::Serialize;
use wifi_ips_core::{LocalProjection, Measurement, PositionEstimate};
use wifi_ips_train::{KnnClassifier, KnnRegressor, ModelArtifacts, ModelError, ModelManifest};

/// Summary of a loaded model, as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub prefix: String,
    pub params: String,
    pub columns: usize,
    pub samples: usize,
}

impl ModelSummary {
    fn from_manifest(manifest: &ModelManifest) -> Self {
        Self {
            prefix: manifest.prefix.clone(),
            params: manifest.params.to_string(),
            columns: manifest.n_features,
            samples: manifest.n_samples,
        }
    }
}

/// The two models behind the estimation endpoint.
#[derive(Debug)]
pub struct PositionEstimator {
    position: ModelArtifacts<KnnRegressor>,
    floor: ModelArtifacts<KnnClassifier>,
    projection: LocalProjection,
}

impl PositionEstimator {
    /// Pair two loaded artifact sets.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unavailable`] if the position model carries no
    /// projection origin.
    pub fn new(
        position: ModelArtifacts<KnnRegressor>,
        floor: ModelArtifacts<KnnClassifier>,
    ) -> Result<Self, ModelError> {
        let projection = position.projection().ok_or_else(|| {
            let prefix = position.manifest().prefix.clone();
            ModelError::unavailable("", prefix, "position model has no projection origin")
        })?;
        Ok(Self { position, floor, projection })
    }

    /// Load both artifact sets from `dir`.
    pub fn load(dir: &Path, position_prefix: &str, floor_prefix: &str) -> Result<Self, ModelError> {
        let position = ModelArtifacts::<KnnRegressor>::load(dir, position_prefix)?;
        let floor = ModelArtifacts::<KnnClassifier>::load(dir, floor_prefix)?;
        Self::new(position, floor)
    }

    /// Estimate position and floor from one scan.
    ///
    /// BSSIDs outside a model's column universe are ignored by that model.
    pub fn estimate(&self, measurements: &[Measurement]) -> Result<PositionEstimate, ModelError> {
        let planar = self.position.predict_measurements(measurements)?;
        let floor = self.floor.predict_measurements(measurements)?;
        Ok(PositionEstimate { location: self.projection.unproject(planar), floor })
    }

    pub fn position_summary(&self) -> ModelSummary {
        ModelSummary::from_manifest(self.position.manifest())
    }

    pub fn floor_summary(&self) -> ModelSummary {
        ModelSummary::from_manifest(self.floor.manifest())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;
    use wifi_ips_core::{BssidId, FloorId, GeoPoint, PlanarPoint};
    use wifi_ips_train::{ColumnUniverse, DistanceMetric, Estimator, KnnParams};
    use wifi_ips_train::scaler::StandardScaler;

    pub(crate) fn ap(n: u8) -> BssidId {
        BssidId([0x0a, 0, 0, 0, 0, n])
    }

    /// Two reference points 100 m apart on floors 0 and 3.
    pub(crate) fn fixture() -> PositionEstimator {
        let projection = LocalProjection::with_origin(GeoPoint::new(40.0, -3.0));
        let columns = ColumnUniverse::from_bssids([ap(1), ap(2)]);
        let x = array![[-40.0, -120.0], [-120.0, -40.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        let params = KnnParams::new(1, DistanceMetric::Manhattan);

        let targets = [PlanarPoint::new(0.0, 0.0), PlanarPoint::new(0.0, 100.0)];
        let regressor = KnnRegressor::fit(params, &scaled, &targets).unwrap();
        let classifier = KnnClassifier::fit(params, &scaled, &[FloorId(0), FloorId(3)]).unwrap();

        let projection = Some(projection);
        let position =
            ModelArtifacts::new("2d", regressor, scaler.clone(), columns.clone(), 2, projection)
                .unwrap();
        let floor = ModelArtifacts::new("fd", classifier, scaler, columns, 2, projection).unwrap();
        PositionEstimator::new(position, floor).unwrap()
    }

    #[test]
    fn estimate_unprojects_to_geographic_coordinates() {
        let estimator = fixture();
        let near_origin = estimator.estimate(&[Measurement { bssid: ap(1), rss: -42.0 }]).unwrap();
        assert_eq!(near_origin.floor, FloorId(0));
        assert!((near_origin.location.latitude - 40.0).abs() < 1e-9);
        assert!((near_origin.location.longitude + 3.0).abs() < 1e-9);

        let north = estimator.estimate(&[Measurement { bssid: ap(2), rss: -41.0 }]).unwrap();
        assert_eq!(north.floor, FloorId(3));
        // 100 m north is about 0.0009 degrees of latitude.
        assert!((north.location.latitude - 40.000_899).abs() < 1e-5);
    }

    #[test]
    fn unknown_bssids_are_ignored() {
        let estimator = fixture();
        let scan = [
            Measurement { bssid: ap(2), rss: -41.0 },
            Measurement { bssid: ap(9), rss: -30.0 },
        ];
        let est = estimator.estimate(&scan).unwrap();
        assert_eq!(est.floor, FloorId(3));
    }

    #[test]
    fn missing_models_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = PositionEstimator::load(dir.path(), "2d", "fd").unwrap_err();
        assert!(matches!(err, ModelError::Unavailable { .. }));
    }

    #[test]
    fn summaries_describe_loaded_models() {
        let estimator = fixture();
        let s = estimator.position_summary();
        assert_eq!(s.prefix, "2d");
        assert_eq!(s.columns, 2);
        assert_eq!(estimator.floor_summary().prefix, "fd");
    }
}

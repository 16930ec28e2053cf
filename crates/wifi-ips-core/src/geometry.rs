//! Great-circle distance and the local planar frame used for regression.
//!
//! Positions are projected onto a metric `(x, y)` plane anchored at the
//! south-west corner of the reference data: `x` is the haversine distance
//! along the origin's parallel, `y` the distance along its meridian.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point in geographic coordinates (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A point in the local metric frame (metres east and north of the origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other` in metres.
    pub fn distance(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Great-circle distance in metres between two points.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let (lat_a, lat_b) = (a.latitude.to_radians(), b.latitude.to_radians());
    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

// ---------------------------------------------------------------------------
// LocalProjection
// ---------------------------------------------------------------------------

/// Projection of geographic points onto the local metric plane.
///
/// The origin is `(min latitude, min longitude)` over the reference points,
/// which makes every reference point project into the positive quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalProjection {
    origin: GeoPoint,
}

impl LocalProjection {
    /// Anchor a projection at an explicit origin.
    pub const fn with_origin(origin: GeoPoint) -> Self {
        Self { origin }
    }

    /// Anchor a projection at the minimum latitude and minimum longitude of
    /// `points`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyInput`] when `points` yields nothing.
    pub fn from_points<I>(points: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        let mut iter = points.into_iter();
        let first = iter
            .next()
            .ok_or(CoreError::EmptyInput("projection reference points"))?;
        let origin = iter.fold(first, |acc, p| {
            GeoPoint::new(acc.latitude.min(p.latitude), acc.longitude.min(p.longitude))
        });
        Ok(Self { origin })
    }

    /// The reference origin.
    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Project `point` onto the local plane.
    pub fn project(&self, point: GeoPoint) -> PlanarPoint {
        let GeoPoint { latitude, longitude } = self.origin;
        let x = haversine_distance(self.origin, GeoPoint::new(latitude, point.longitude));
        let y = haversine_distance(self.origin, GeoPoint::new(point.latitude, longitude));
        PlanarPoint::new(x, y)
    }

    /// Map a planar point back to geographic coordinates.
    ///
    /// Exact inverse of [`project`](Self::project) for points east and north
    /// of the origin.
    pub fn unproject(&self, point: PlanarPoint) -> GeoPoint {
        let lat0 = self.origin.latitude.to_radians();
        let dlat = point.y / EARTH_RADIUS_M;
        let half = ((point.x / (2.0 * EARTH_RADIUS_M)).sin() / lat0.cos()).clamp(-1.0, 1.0);
        let dlon = 2.0 * half.asin();
        GeoPoint::new(
            self.origin.latitude + dlat.to_degrees(),
            self.origin.longitude + dlon.to_degrees(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn origin_is_componentwise_minimum() {
        let proj = LocalProjection::from_points([
            GeoPoint::new(40.3, -3.7),
            GeoPoint::new(40.1, -3.6),
            GeoPoint::new(40.2, -3.9),
        ])
        .unwrap();
        assert_eq!(proj.origin(), GeoPoint::new(40.1, -3.9));
    }

    #[test]
    fn origin_projects_to_zero() {
        let points = [GeoPoint::new(40.0, -3.0), GeoPoint::new(40.01, -2.99)];
        let proj = LocalProjection::from_points(points).unwrap();
        let p = proj.project(proj.origin());
        assert_eq!(p, PlanarPoint::new(0.0, 0.0));
    }

    #[test]
    fn empty_reference_set_is_rejected() {
        let err = LocalProjection::from_points(std::iter::empty()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyInput(_)));
    }

    #[test]
    fn unproject_inverts_project() {
        let proj = LocalProjection::with_origin(GeoPoint::new(40.3128, -3.4835));
        let target = GeoPoint::new(40.3135, -3.4827);
        let planar = proj.project(target);
        assert!(planar.x > 0.0 && planar.y > 0.0);
        let back = proj.unproject(planar);
        assert_relative_eq!(back.latitude, target.latitude, epsilon = 1e-9);
        assert_relative_eq!(back.longitude, target.longitude, epsilon = 1e-9);
    }

    #[test]
    fn northward_offset_is_pure_y() {
        let proj = LocalProjection::with_origin(GeoPoint::new(0.0, 0.0));
        let p = proj.project(GeoPoint::new(1.0, 0.0));
        assert_eq!(p.x, 0.0);
        assert!((p.y - 111_195.0).abs() < 200.0);
    }
}

//! # WiFi IPS Core
//!
//! Shared building blocks for WiFi fingerprint indoor positioning:
//!
//! - **Types**: [`BssidId`], [`PositionSample`], [`WifiScanSample`],
//!   [`FingerprintRow`], [`DeviceState`] and the identifier newtypes.
//! - **Geometry**: haversine distance and the [`LocalProjection`] used to
//!   train position regressors in metres.
//! - **Time**: millisecond grid and equality helpers for session timestamps.
//! - **Storage ports**: [`FingerprintStore`] and [`EstimateStore`] with
//!   in-memory adapters.
//!
//! ## Example
//!
//! ```rust
//! use wifi_ips_core::{GeoPoint, LocalProjection};
//!
//! let proj = LocalProjection::from_points([
//!     GeoPoint::new(40.3128, -3.4835),
//!     GeoPoint::new(40.3135, -3.4827),
//! ]).unwrap();
//! let p = proj.project(GeoPoint::new(40.3135, -3.4827));
//! assert!(p.x > 0.0 && p.y > 0.0);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod geometry;
pub mod store;
pub mod time;
pub mod types;

pub use error::{CoreError, CoreResult, StorageError};
pub use geometry::{haversine_distance, GeoPoint, LocalProjection, PlanarPoint, EARTH_RADIUS_M};
pub use store::{EstimateStore, FingerprintStore, MemoryEstimateStore, MemoryFingerprintStore};
pub use types::{
    BssidId, BuildingId, DeviceId, DeviceState, EstimateRecord, FingerprintRow, FloorId,
    Measurement, PositionEstimate, PositionSample, SessionId, SessionRole, WifiScanSample,
    SYNTHETIC_COUNTER,
};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

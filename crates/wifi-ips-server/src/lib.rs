//! # WiFi IPS Server
//!
//! Online half of the WiFi fingerprint positioning system: loads the
//! position and floor models produced by `train`, serves estimates over
//! REST and tracks the last known position of every device.
//!
//! - [`config`]: `ServerConfig`
//! - [`estimator`]: live estimation from a scan
//! - [`tracker`]: per-device last known position
//! - [`api`]: axum router, handlers and DTOs

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod estimator;
pub mod tracker;

pub use api::{create_router, AppState};
pub use config::{ServerConfig, ServerConfigError};
pub use estimator::PositionEstimator;
pub use tracker::{DeviceSnapshot, PositionTracker, RecordOutcome};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

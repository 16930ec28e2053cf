//! Data Transfer Objects for the estimation REST API.
//!
//! Request bodies use `snake_case` as sent by the capture app; response
//! bodies use `camelCase` as read by the dashboard.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::estimator::ModelSummary;

// ============================================================================
// Estimation
// ============================================================================

/// One access point observed by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiMeasurementDto {
    /// BSSID in `aa:bb:cc:dd:ee:ff` form, any case.
    pub mac_bssid: String,
    /// Received signal strength in dBm.
    pub rssi: f64,
}

/// Request body of `POST /estimator/estimate-position`.
///
/// ## Example
///
/// ```json
/// {
///   "device_name": "pixel-7",
///   "wifi_measurements": [
///     { "mac_bssid": "aa:bb:cc:dd:ee:01", "rssi": -51 },
///     { "mac_bssid": "aa:bb:cc:dd:ee:02", "rssi": -77 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatePositionRequest {
    pub device_name: String,
    #[serde(default)]
    pub wifi_measurements: Vec<WifiMeasurementDto>,
}

/// Response body of `POST /estimator/estimate-position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatePositionResponse {
    pub device_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub floor_id: i32,
    /// Server time of the estimate, in the configured timezone.
    pub current_timestamp: DateTime<FixedOffset>,
    /// Whether the estimate reached the estimate store.
    pub persisted: bool,
}

// ============================================================================
// User positions
// ============================================================================

/// Last known position of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPositionDto {
    pub device_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub floor_id: i32,
    pub last_update_timestamp: DateTime<FixedOffset>,
    pub last_update_in_seconds: f64,
    pub is_stale: bool,
}

/// Response body of `GET /users/user-positions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPositionsResponse {
    pub system_timestamp: DateTime<FixedOffset>,
    pub users: Vec<UserPositionDto>,
}

/// Response body of `/users/clear-user-positions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearPositionsResponse {
    /// Device states removed from the tracker.
    pub cleared: usize,
    /// Whether the estimate store was cleared too.
    pub persisted: bool,
}

// ============================================================================
// Service
// ============================================================================

/// Response body of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub tracked_devices: usize,
    pub position_model: ModelSummary,
    pub floor_model: ModelSummary,
}

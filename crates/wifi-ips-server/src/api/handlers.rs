//! Axum request handlers for the estimation REST API.

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use chrono::{DateTime, FixedOffset, Utc};
use wifi_ips_core::{BssidId, DeviceId, EstimateRecord, Measurement};

use super::dto::*;
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::tracker::RecordOutcome;

// ============================================================================
// Estimation
// ============================================================================

/// Estimate the position of a device from one WiFi scan.
///
/// The estimate becomes the device's tracked state and is appended to the
/// estimate store. A store failure does not fail the request; the response
/// then carries `persisted: false`.
///
/// ```yaml
/// /estimator/estimate-position:
///   post:
///     requestBody: EstimatePositionRequest
///     responses:
///       200: EstimatePositionResponse
///       400: body is not a valid request
///       422: empty device_name
///       500: ESTIMATION_FAILED
/// ```
#[tracing::instrument(skip_all, fields(device = tracing::field::Empty))]
pub async fn estimate_position(
    State(state): State<AppState>,
    payload: Result<Json<EstimatePositionRequest>, JsonRejection>,
) -> ApiResult<Json<EstimatePositionResponse>> {
    let Json(request) = payload?;
    let device_name = request.device_name.trim();
    tracing::Span::current().record("device", device_name);
    if device_name.is_empty() {
        let field = Some("device_name".to_owned());
        return Err(ApiError::validation("device_name must not be empty", field));
    }
    let measurements = parse_measurements(&request.wifi_measurements);

    let estimate = state.estimator().estimate(&measurements)?;
    let now = Utc::now();
    let device = DeviceId::new(device_name);

    if state.tracker().record_estimate(device.clone(), estimate, now) == RecordOutcome::Stale {
        tracing::warn!("Tracker kept a newer state for this device");
    }

    let record = EstimateRecord { device, estimate, timestamp: now, measurements };
    let persisted = match state.store().record_estimate(&record) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Estimate not persisted");
            false
        }
    };

    Ok(Json(EstimatePositionResponse {
        device_name: device_name.to_owned(),
        latitude: estimate.location.latitude,
        longitude: estimate.location.longitude,
        floor_id: estimate.floor.0,
        current_timestamp: state.local_time(now),
        persisted,
    }))
}

/// Convert request measurements, dropping entries with an unparseable BSSID.
fn parse_measurements(raw: &[WifiMeasurementDto]) -> Vec<Measurement> {
    raw.iter()
        .filter_map(|m| match BssidId::parse(&m.mac_bssid) {
            Ok(bssid) if m.rssi.is_finite() => Some(Measurement { bssid, rss: m.rssi }),
            Ok(_) => {
                tracing::warn!(bssid = %m.mac_bssid, "Dropping measurement with non-finite rssi");
                None
            }
            Err(e) => {
                tracing::warn!(bssid = %m.mac_bssid, error = %e, "Dropping measurement");
                None
            }
        })
        .collect()
}

// ============================================================================
// User positions
// ============================================================================

/// Last known position of every device, with its age.
#[tracing::instrument(skip(state))]
pub async fn user_positions(State(state): State<AppState>) -> Json<UserPositionsResponse> {
    let now = Utc::now();
    let users = state
        .tracker()
        .list_current_positions(now)
        .into_iter()
        .map(|snapshot| UserPositionDto {
            device_name: snapshot.state.device.as_str().to_owned(),
            latitude: snapshot.state.estimate.location.latitude,
            longitude: snapshot.state.estimate.location.longitude,
            floor_id: snapshot.state.estimate.floor.0,
            last_update_timestamp: state.local_time(snapshot.state.last_update),
            last_update_in_seconds: snapshot.staleness_secs,
            is_stale: snapshot.is_stale,
        })
        .collect();
    Json(UserPositionsResponse { system_timestamp: state.local_time(now), users })
}

/// Forget every device: tracker and estimate store.
#[tracing::instrument(skip(state))]
pub async fn clear_user_positions(State(state): State<AppState>) -> Json<ClearPositionsResponse> {
    let cleared = state.tracker().clear_all();
    let persisted = match state.store().clear() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Estimate store not cleared");
            false
        }
    };
    Json(ClearPositionsResponse { cleared, persisted })
}

// ============================================================================
// Service
// ============================================================================

/// Server clock in the configured timezone.
pub async fn current_date(State(state): State<AppState>) -> Json<DateTime<FixedOffset>> {
    Json(state.local_time(Utc::now()))
}

/// Liveness message.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse { message: "Service running".to_owned() })
}

/// Liveness plus a summary of the loaded models.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_seconds: (Utc::now() - state.started_at()).num_seconds(),
        tracked_devices: state.tracker().len(),
        position_model: state.estimator().position_summary(),
        floor_model: state.estimator().floor_summary(),
    })
}

//! Storage collaborator ports and their in-memory adapters.
//!
//! The offline pipeline writes whole sessions of fingerprint rows through
//! [`FingerprintStore`]; the serving path appends every served estimate
//! through [`EstimateStore`]. Both traits are synchronous and report failures
//! as [`StorageError`]; callers decide whether a failure is fatal.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::StorageError;
use crate::time::millis_key;
use crate::types::{DeviceId, DeviceState, EstimateRecord, FingerprintRow, SessionId};

/// Persistence of labeled fingerprint rows, one session per batch.
pub trait FingerprintStore: Send + Sync {
    /// Replace every row of `session` with `rows`.
    ///
    /// All-or-nothing: on error the previously stored rows of the session
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BatchAborted`] if the batch violates row
    /// uniqueness or names another session.
    fn replace_session(
        &self,
        session: &SessionId,
        rows: Vec<FingerprintRow>,
    ) -> Result<usize, StorageError>;

    /// All stored rows, ordered by session, position timestamp and BSSID.
    fn rows(&self) -> Result<Vec<FingerprintRow>, StorageError>;

    /// Remove every stored row.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Persistence of served estimates and the fingerprints behind them.
pub trait EstimateStore: Send + Sync {
    /// Append one served estimate and its measurements as a single write.
    fn record_estimate(&self, record: &EstimateRecord) -> Result<(), StorageError>;

    /// The most recent stored state of every device.
    fn latest_per_device(&self) -> Result<Vec<DeviceState>, StorageError>;

    /// Remove every stored estimate.
    fn clear(&self) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// MemoryFingerprintStore
// ---------------------------------------------------------------------------

/// In-process [`FingerprintStore`].
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    sessions: RwLock<BTreeMap<SessionId, Vec<FingerprintRow>>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn replace_session(
        &self,
        session: &SessionId,
        mut rows: Vec<FingerprintRow>,
    ) -> Result<usize, StorageError> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if &row.session != session {
                return Err(StorageError::batch_aborted(
                    session.as_str(),
                    format!("row belongs to session '{}'", row.session),
                ));
            }
            if !seen.insert((millis_key(row.position_timestamp), row.bssid)) {
                return Err(StorageError::batch_aborted(
                    session.as_str(),
                    format!(
                        "duplicate row for position {} and bssid {}",
                        row.position_timestamp, row.bssid
                    ),
                ));
            }
        }
        rows.sort_by(|a, b| {
            a.position_timestamp
                .total_cmp(&b.position_timestamp)
                .then_with(|| a.bssid.cmp(&b.bssid))
        });
        let count = rows.len();
        self.sessions.write().insert(session.clone(), rows);
        tracing::debug!(session = %session, rows = count, "Stored fingerprint session");
        Ok(count)
    }

    fn rows(&self) -> Result<Vec<FingerprintRow>, StorageError> {
        Ok(self.sessions.read().values().flatten().cloned().collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.sessions.write().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryEstimateStore
// ---------------------------------------------------------------------------

/// In-process [`EstimateStore`].
///
/// Can be switched offline with [`set_available`](Self::set_available) to
/// exercise failure handling.
#[derive(Debug)]
pub struct MemoryEstimateStore {
    records: RwLock<Vec<EstimateRecord>>,
    available: AtomicBool,
}

impl Default for MemoryEstimateStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryEstimateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle whether the store accepts reads and writes.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored estimates.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if no estimate is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("estimate store is offline".into()))
        }
    }
}

impl EstimateStore for MemoryEstimateStore {
    fn record_estimate(&self, record: &EstimateRecord) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.records.write().push(record.clone());
        Ok(())
    }

    fn latest_per_device(&self) -> Result<Vec<DeviceState>, StorageError> {
        self.ensure_available()?;
        let records = self.records.read();
        let mut latest: HashMap<&DeviceId, &EstimateRecord> = HashMap::new();
        for record in records.iter() {
            latest
                .entry(&record.device)
                .and_modify(|current| {
                    if record.timestamp >= current.timestamp {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        let mut states: Vec<DeviceState> = latest
            .into_values()
            .map(|r| DeviceState {
                device: r.device.clone(),
                estimate: r.estimate,
                last_update: r.timestamp,
            })
            .collect();
        states.sort_by(|a, b| a.device.cmp(&b.device));
        Ok(states)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoPoint;
    use crate::types::{BssidId, FloorId, Measurement, PositionEstimate};
    use chrono::{TimeZone, Utc};

    fn row(session: &str, ts: f64, bssid: &str) -> FingerprintRow {
        FingerprintRow {
            session: SessionId::new(session),
            position_timestamp: ts,
            scan_timestamp: ts,
            bssid: BssidId::parse(bssid).unwrap(),
            rss: -60,
            latitude: 40.0,
            longitude: -3.0,
            floor: FloorId(0),
        }
    }

    #[test]
    fn replace_session_is_all_or_nothing() {
        let store = MemoryFingerprintStore::new();
        let session = SessionId::new("TrainingTrial1");
        store
            .replace_session(&session, vec![row("TrainingTrial1", 1.0, "00:00:00:00:00:01")])
            .unwrap();

        let bad = vec![
            row("TrainingTrial1", 2.0, "00:00:00:00:00:01"),
            row("TrainingTrial1", 2.0, "00:00:00:00:00:01"),
        ];
        let err = store.replace_session(&session, bad).unwrap_err();
        assert!(matches!(err, StorageError::BatchAborted { .. }));

        let rows = store.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position_timestamp, 1.0);
    }

    #[test]
    fn replace_session_rejects_foreign_rows() {
        let store = MemoryFingerprintStore::new();
        let err = store
            .replace_session(&SessionId::new("A"), vec![row("B", 1.0, "00:00:00:00:00:01")])
            .unwrap_err();
        assert!(matches!(err, StorageError::BatchAborted { .. }));
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn latest_per_device_picks_newest_record() {
        let store = MemoryEstimateStore::new();
        let device = DeviceId::new("phone-1");
        for (secs, lat) in [(10, 40.0), (30, 40.2), (20, 40.1)] {
            store
                .record_estimate(&EstimateRecord {
                    device: device.clone(),
                    estimate: PositionEstimate {
                        location: GeoPoint::new(lat, -3.0),
                        floor: FloorId(1),
                    },
                    timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
                    measurements: vec![Measurement {
                        bssid: BssidId([0, 0, 0, 0, 0, 1]),
                        rss: -55.0,
                    }],
                })
                .unwrap();
        }
        let latest = store.latest_per_device().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].estimate.location.latitude, 40.2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn offline_store_reports_failure() {
        let store = MemoryEstimateStore::new();
        store.set_available(false);
        assert!(matches!(store.latest_per_device(), Err(StorageError::Unavailable(_))));
        store.set_available(true);
        assert!(store.clear().is_ok());
        assert!(store.is_empty());
    }
}

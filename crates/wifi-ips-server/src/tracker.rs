//! Online position-state tracker.
//!
//! Holds exactly one [`DeviceState`] per device: the last estimate served to
//! it. An update replaces the whole record under a single write lock, so a
//! reader never sees a position from one estimate with the timestamp of
//! another. Staleness is computed at read time and never stored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use wifi_ips_core::{DeviceId, DeviceState, PositionEstimate};

/// What [`PositionTracker::record_estimate`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First state for the device.
    Inserted,
    /// Replaced an older or equally old state.
    Updated,
    /// Rejected because the stored state is newer.
    Stale,
}

/// A device state annotated with its age at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub state: DeviceState,
    pub staleness_secs: f64,
    pub is_stale: bool,
}

/// Last known position of every device.
#[derive(Debug)]
pub struct PositionTracker {
    states: RwLock<HashMap<DeviceId, DeviceState>>,
    stale_after_secs: f64,
    reject_out_of_order: bool,
}

impl PositionTracker {
    pub fn new(stale_after_secs: f64, reject_out_of_order: bool) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            stale_after_secs,
            reject_out_of_order,
        }
    }

    /// Store `estimate` as the state of `device`.
    ///
    /// With out-of-order rejection enabled, an update strictly older than the
    /// stored state is dropped; equal timestamps overwrite.
    pub fn record_estimate(
        &self,
        device: DeviceId,
        estimate: PositionEstimate,
        timestamp: DateTime<Utc>,
    ) -> RecordOutcome {
        let mut states = self.states.write();
        let outcome = match states.get(&device) {
            None => RecordOutcome::Inserted,
            Some(current) if self.reject_out_of_order && timestamp < current.last_update => {
                tracing::debug!(
                    device = %device,
                    stored = %current.last_update,
                    incoming = %timestamp,
                    "Dropping out-of-order estimate"
                );
                return RecordOutcome::Stale;
            }
            Some(_) => RecordOutcome::Updated,
        };
        states.insert(device.clone(), DeviceState { device, estimate, last_update: timestamp });
        outcome
    }

    /// Every device state with its staleness relative to `now`, ordered by
    /// device id.
    pub fn list_current_positions(&self, now: DateTime<Utc>) -> Vec<DeviceSnapshot> {
        let mut snapshots: Vec<DeviceSnapshot> = self
            .states
            .read()
            .values()
            .map(|state| {
                let staleness_secs = (now - state.last_update).num_milliseconds() as f64 / 1000.0;
                DeviceSnapshot {
                    state: state.clone(),
                    staleness_secs,
                    is_stale: staleness_secs > self.stale_after_secs,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.state.device.cmp(&b.state.device));
        snapshots
    }

    /// State of one device.
    pub fn get(&self, device: &DeviceId) -> Option<DeviceState> {
        self.states.read().get(device).cloned()
    }

    /// Remove every device state and return how many were removed.
    pub fn clear_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.states.write());
        let removed = drained.len();
        tracing::info!(removed, "Cleared device states");
        removed
    }

    /// Seed the tracker from persisted states, e.g. at start-up.
    ///
    /// Returns the number of states accepted.
    pub fn warm<I>(&self, states: I) -> usize
    where
        I: IntoIterator<Item = DeviceState>,
    {
        states
            .into_iter()
            .map(|s| self.record_estimate(s.device, s.estimate, s.last_update))
            .filter(|o| *o != RecordOutcome::Stale)
            .count()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use wifi_ips_core::{FloorId, GeoPoint};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn est(lat: f64, floor: i32) -> PositionEstimate {
        PositionEstimate { location: GeoPoint::new(lat, -3.0), floor: FloorId(floor) }
    }

    #[test]
    fn later_update_overwrites_whole_record() {
        let tracker = PositionTracker::new(60.0, true);
        let first = tracker.record_estimate("d1".into(), est(40.0, 0), t(0));
        assert_eq!(first, RecordOutcome::Inserted);
        let second = tracker.record_estimate("d1".into(), est(41.0, 2), t(5));
        assert_eq!(second, RecordOutcome::Updated);
        let state = tracker.get(&"d1".into()).unwrap();
        assert_eq!(state.estimate, est(41.0, 2));
        assert_eq!(state.last_update, t(5));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn older_update_is_rejected_when_enabled() {
        let tracker = PositionTracker::new(60.0, true);
        tracker.record_estimate("d1".into(), est(40.0, 0), t(10));
        assert_eq!(tracker.record_estimate("d1".into(), est(41.0, 1), t(9)), RecordOutcome::Stale);
        assert_eq!(tracker.get(&"d1".into()).unwrap().last_update, t(10));
        let same_instant = tracker.record_estimate("d1".into(), est(42.0, 1), t(10));
        assert_eq!(same_instant, RecordOutcome::Updated);
        assert_eq!(tracker.get(&"d1".into()).unwrap().estimate, est(42.0, 1));
    }

    #[test]
    fn older_update_wins_when_rejection_disabled() {
        let tracker = PositionTracker::new(60.0, false);
        tracker.record_estimate("d1".into(), est(40.0, 0), t(10));
        let older = tracker.record_estimate("d1".into(), est(41.0, 1), t(9));
        assert_eq!(older, RecordOutcome::Updated);
        assert_eq!(tracker.get(&"d1".into()).unwrap().last_update, t(9));
    }

    #[test]
    fn listing_computes_staleness_at_read_time() {
        let tracker = PositionTracker::new(60.0, true);
        tracker.record_estimate("b".into(), est(40.0, 0), t(0));
        tracker.record_estimate("a".into(), est(40.0, 0), t(100));
        let list = tracker.list_current_positions(t(130));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].state.device.as_str(), "a");
        assert_eq!(list[0].staleness_secs, 30.0);
        assert!(!list[0].is_stale);
        assert_eq!(list[1].staleness_secs, 130.0);
        assert!(list[1].is_stale);

        let later = tracker.list_current_positions(t(130) + Duration::milliseconds(500));
        assert_eq!(later[0].staleness_secs, 30.5);
    }

    #[test]
    fn clear_all_then_list_is_empty() {
        let tracker = PositionTracker::new(60.0, true);
        tracker.record_estimate("d1".into(), est(40.0, 0), t(0));
        tracker.record_estimate("d2".into(), est(40.0, 1), t(0));
        assert_eq!(tracker.clear_all(), 2);
        assert!(tracker.list_current_positions(t(1)).is_empty());
        assert_eq!(tracker.clear_all(), 0);
        assert!(tracker.is_empty());
    }

    #[test]
    fn warm_keeps_newest_state() {
        let tracker = PositionTracker::new(60.0, true);
        let accepted = tracker.warm([
            DeviceState { device: "d1".into(), estimate: est(40.0, 0), last_update: t(5) },
            DeviceState { device: "d1".into(), estimate: est(41.0, 0), last_update: t(1) },
            DeviceState { device: "d2".into(), estimate: est(42.0, 0), last_update: t(3) },
        ]);
        assert_eq!(accepted, 2);
        assert_eq!(tracker.get(&"d1".into()).unwrap().last_update, t(5));
    }

    #[test]
    fn readers_never_see_a_mixed_record() {
        use std::sync::atomic::{AtomicBool, Ordering};

        // Every field of a written state is derived from the same counter.
        fn state_for(n: i64) -> PositionEstimate {
            PositionEstimate {
                location: GeoPoint::new(n as f64, -(n as f64)),
                floor: FloorId((n % 7) as i32),
            }
        }

        let tracker = PositionTracker::new(60.0, false);
        let writing = AtomicBool::new(true);
        std::thread::scope(|s| {
            let writers: Vec<_> = (0..4)
                .map(|worker| {
                    let tracker = &tracker;
                    s.spawn(move || {
                        for i in 0..500 {
                            let n = i * 4 + worker;
                            tracker.record_estimate("d1".into(), state_for(n), t(n));
                        }
                    })
                })
                .collect();
            for _ in 0..4 {
                let (tracker, writing) = (&tracker, &writing);
                s.spawn(move || {
                    let mut checked = 0usize;
                    while writing.load(Ordering::Acquire) || checked == 0 {
                        for snapshot in tracker.list_current_positions(t(10_000)) {
                            let n = (snapshot.state.last_update - t(0)).num_seconds();
                            let expected = state_for(n);
                            assert_eq!(snapshot.state.estimate, expected, "mixed record n={n}");
                            checked += 1;
                        }
                    }
                });
            }
            for writer in writers {
                writer.join().unwrap();
            }
            writing.store(false, Ordering::Release);
        });
    }

    #[test]
    fn concurrent_writers_leave_one_consistent_record() {
        let tracker = PositionTracker::new(60.0, true);
        std::thread::scope(|s| {
            for worker in 0..8 {
                let tracker = &tracker;
                s.spawn(move || {
                    for i in 0..200 {
                        let secs = i * 8 + worker;
                        // Latitude encodes the timestamp so readers can check pairing.
                        tracker.record_estimate("d1".into(), est(secs as f64, 0), t(secs));
                        let _ = tracker.list_current_positions(t(10_000));
                    }
                });
            }
        });
        let state = tracker.get(&"d1".into()).unwrap();
        assert_eq!(state.last_update, t(199 * 8 + 7));
        assert_eq!(state.estimate.location.latitude, (199 * 8 + 7) as f64);
    }
}

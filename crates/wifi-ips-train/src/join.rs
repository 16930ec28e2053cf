//! Temporal join of position fixes with WiFi scans.
//!
//! Scans are grouped by their application timestamp at millisecond
//! granularity. Each position then picks at most one group:
//!
//! - [`JoinPolicy::ExactMatch`]: the group with the same millisecond key;
//! - [`JoinPolicy::LastBefore`]: the latest group strictly before it.
//!
//! Neither policy ever looks at scans after the position.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wifi_ips_core::time::millis_key;
use wifi_ips_core::{FingerprintRow, PositionSample, SessionId, SessionRole, WifiScanSample};

/// Rule for pairing a position with a scan group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    ExactMatch,
    LastBefore,
}

impl JoinPolicy {
    /// Training walks were densified onto the scan clock and join exactly;
    /// evaluation walks use the last scan seen before each fix.
    pub fn for_role(role: SessionRole) -> Self {
        match role {
            SessionRole::Training => Self::ExactMatch,
            SessionRole::Evaluation => Self::LastBefore,
        }
    }
}

/// Scans of one session indexed by millisecond key.
pub struct ScanIndex<'a> {
    groups: BTreeMap<i64, Vec<&'a WifiScanSample>>,
}

impl<'a> ScanIndex<'a> {
    pub fn new(scans: &'a [WifiScanSample]) -> Self {
        let mut groups: BTreeMap<i64, Vec<&'a WifiScanSample>> = BTreeMap::new();
        for scan in scans {
            groups.entry(millis_key(scan.app_timestamp)).or_default().push(scan);
        }
        Self { groups }
    }

    /// Number of distinct scan groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The group selected for a position at `timestamp` under `policy`.
    pub fn lookup(&self, timestamp: f64, policy: JoinPolicy) -> Option<&[&'a WifiScanSample]> {
        let key = millis_key(timestamp);
        let group = match policy {
            JoinPolicy::ExactMatch => self.groups.get(&key),
            JoinPolicy::LastBefore => self.groups.range(..key).next_back().map(|(_, g)| g),
        };
        group.map(Vec::as_slice)
    }
}

/// Join one session's positions with its scans.
///
/// Rows are emitted in position order; within a group, in BSSID order.
/// Duplicate BSSIDs in a group resolve last-wins, so every
/// `(position_timestamp, bssid)` appears at most once.
pub fn join_session(
    session: &SessionId,
    positions: &[PositionSample],
    scans: &[WifiScanSample],
    policy: JoinPolicy,
) -> Vec<FingerprintRow> {
    let index = ScanIndex::new(scans);
    let mut rows = Vec::new();
    let mut unmatched = 0usize;

    for position in positions {
        let Some(group) = index.lookup(position.timestamp, policy) else {
            unmatched += 1;
            continue;
        };
        let mut by_bssid = BTreeMap::new();
        for scan in group {
            by_bssid.insert(scan.bssid, *scan);
        }
        rows.extend(by_bssid.into_values().map(|scan| FingerprintRow {
            session: session.clone(),
            position_timestamp: position.timestamp,
            scan_timestamp: scan.app_timestamp,
            bssid: scan.bssid,
            rss: scan.rss,
            latitude: position.latitude,
            longitude: position.longitude,
            floor: position.floor,
        }));
    }

    tracing::debug!(
        session = %session,
        ?policy,
        positions = positions.len(),
        scan_groups = index.len(),
        unmatched,
        rows = rows.len(),
        "Joined session"
    );
    rows
}

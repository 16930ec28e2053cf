//! Labeled fingerprint dataset.
//!
//! Turns parsed [`SessionData`] into joined [`FingerprintRow`]s, one
//! session at a time and in parallel:
//!
//! ```text
//! SessionData ──► interpolate (training only) ──► join_session ──► ProcessedSession
//! ```
//!
//! [`FingerprintDataset`] collects the processed sessions together with the
//! column universe (every BSSID seen in any scan) and the planar projection
//! anchored at the south-west corner of all positions.

use rayon::prelude::*;
use wifi_ips_core::{
    FingerprintRow, FingerprintStore, LocalProjection, SessionId, SessionRole, StorageError,
};

use crate::config::{SessionFilter, TrainingConfig};
use crate::error::TrainError;
use crate::features::ColumnUniverse;
use crate::ingest::SessionData;
use crate::join::{join_session, JoinPolicy};
use crate::trajectory::{interpolate, InterpolationStats};

// ---------------------------------------------------------------------------
// ProcessedSession
// ---------------------------------------------------------------------------

/// One session after densification and join.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSession {
    pub session: SessionId,
    pub role: SessionRole,
    pub rows: Vec<FingerprintRow>,
    /// Interpolation counters; all zero for evaluation sessions.
    pub stats: InterpolationStats,
    /// Records rejected while reading the session.
    pub rejected: usize,
}

/// Densify (training only) and join one session.
pub fn process_session(data: &SessionData, config: &TrainingConfig) -> ProcessedSession {
    let role = SessionRole::classify(&data.session, &config.training_marker);
    let (rows, stats) = match role {
        SessionRole::Training => {
            let policy = config.interpolation_policy(&data.session);
            let dense = interpolate(&data.positions, policy);
            tracing::debug!(
                session = %data.session,
                ?policy,
                originals = dense.stats.originals,
                synthetic = dense.stats.synthetic,
                floor_transitions = dense.stats.floor_transitions,
                degenerate_pairs = dense.stats.degenerate_pairs,
                "Densified trajectory"
            );
            let policy = JoinPolicy::for_role(role);
            let rows = join_session(&data.session, &dense.samples, &data.scans, policy);
            (rows, dense.stats)
        }
        SessionRole::Evaluation => {
            let policy = JoinPolicy::for_role(role);
            let rows = join_session(&data.session, &data.positions, &data.scans, policy);
            (rows, InterpolationStats::default())
        }
    };
    ProcessedSession { session: data.session.clone(), role, rows, stats, rejected: data.rejected }
}

// ---------------------------------------------------------------------------
// FingerprintDataset
// ---------------------------------------------------------------------------

/// All processed sessions of a run.
#[derive(Debug, Clone)]
pub struct FingerprintDataset {
    sessions: Vec<ProcessedSession>,
    universe: ColumnUniverse,
    projection: LocalProjection,
}

impl FingerprintDataset {
    /// Process every session in parallel.
    ///
    /// # Errors
    ///
    /// [`TrainError::EmptyDataset`] if no session has any position, since
    /// the projection origin cannot be derived.
    pub fn build(sessions: &[SessionData], config: &TrainingConfig) -> Result<Self, TrainError> {
        let universe = ColumnUniverse::from_bssids(
            sessions.iter().flat_map(|s| s.scans.iter().map(|scan| scan.bssid)),
        );
        let projection = LocalProjection::from_points(
            sessions.iter().flat_map(|s| s.positions.iter().map(|p| p.location())),
        )
        .map_err(|_| TrainError::EmptyDataset("projection origin".into()))?;

        let processed: Vec<ProcessedSession> =
            sessions.par_iter().map(|s| process_session(s, config)).collect();

        let rows: usize = processed.iter().map(|p| p.rows.len()).sum();
        let rejected: usize = processed.iter().map(|p| p.rejected).sum();
        let training = processed.iter().filter(|p| p.role == SessionRole::Training).count();
        tracing::info!(
            sessions = processed.len(),
            training,
            rows,
            rejected,
            columns = universe.len(),
            "Built fingerprint dataset"
        );
        Ok(Self { sessions: processed, universe, projection })
    }

    pub fn sessions(&self) -> &[ProcessedSession] {
        &self.sessions
    }

    pub fn universe(&self) -> &ColumnUniverse {
        &self.universe
    }

    pub fn projection(&self) -> LocalProjection {
        self.projection
    }

    /// Rows of every session accepted by `filter`.
    pub fn rows_matching(&self, filter: &SessionFilter) -> Vec<FingerprintRow> {
        self.sessions
            .iter()
            .filter(|s| filter.accepts(&s.session))
            .flat_map(|s| s.rows.iter().cloned())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.sessions.iter().map(|s| s.rows.len()).sum()
    }

    /// Write every session through `store`, one batch per session.
    ///
    /// A failing batch is logged and skipped; its session keeps whatever the
    /// store held before. Returns the number of rows written and the failed
    /// sessions.
    pub fn persist(&self, store: &dyn FingerprintStore) -> (usize, Vec<(SessionId, StorageError)>) {
        let mut written = 0;
        let mut failed = Vec::new();
        for session in &self.sessions {
            match store.replace_session(&session.session, session.rows.clone()) {
                Ok(n) => written += n,
                Err(e) => {
                    tracing::error!(
                        session = %session.session,
                        error = %e,
                        "Fingerprint batch aborted"
                    );
                    failed.push((session.session.clone(), e));
                }
            }
        }
        tracing::info!(written, failed = failed.len(), "Persisted fingerprint rows");
        (written, failed)
    }
}

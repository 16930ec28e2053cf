//! Application state for the estimation REST API.
//!
//! Cloned into every handler; everything behind it is shared through one
//! `Arc`. The models are read-only, the tracker synchronizes itself, and
//! the estimate store is an injected collaborator.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use wifi_ips_core::EstimateStore;

use crate::config::ServerConfig;
use crate::estimator::PositionEstimator;
use crate::tracker::PositionTracker;

/// Shared application state for the API.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (not cloned, shared via Arc).
struct AppStateInner {
    estimator: PositionEstimator,
    tracker: PositionTracker,
    store: Arc<dyn EstimateStore>,
    timezone: Tz,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Assemble the state from loaded models and a store.
    ///
    /// An unknown `timezone` falls back to UTC; callers validate the config
    /// first.
    pub fn new(
        config: &ServerConfig,
        estimator: PositionEstimator,
        store: Arc<dyn EstimateStore>,
    ) -> Self {
        let timezone = config.tz().unwrap_or(Tz::UTC);
        Self {
            inner: Arc::new(AppStateInner {
                estimator,
                tracker: PositionTracker::new(config.stale_after_secs, config.reject_out_of_order),
                store,
                timezone,
                started_at: Utc::now(),
            }),
        }
    }

    pub fn estimator(&self) -> &PositionEstimator {
        &self.inner.estimator
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.inner.tracker
    }

    pub fn store(&self) -> &dyn EstimateStore {
        self.inner.store.as_ref()
    }

    /// Zone of every timestamp in responses.
    pub fn timezone(&self) -> Tz {
        self.inner.timezone
    }

    /// `instant` in the configured zone, with the offset in force at that
    /// instant.
    pub fn local_time(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        let local = instant.with_timezone(&self.inner.timezone);
        local.with_timezone(&local.offset().fix())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Seed the tracker from the store's latest states.
    ///
    /// A store failure is logged and leaves the tracker empty.
    pub fn warm_tracker(&self) -> usize {
        match self.store().latest_per_device() {
            Ok(states) => {
                let n = self.tracker().warm(states);
                tracing::info!(devices = n, "Restored device states from the estimate store");
                n
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not restore device states");
                0
            }
        }
    }
}

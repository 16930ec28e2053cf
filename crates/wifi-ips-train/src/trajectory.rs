//! Densification of sparse ground-truth trajectories.
//!
//! Consecutive fixes are joined by linear interpolation on a 1 ms grid.
//! For a pair `(p1, p2)` with grid indices `start = ms(t1)` and
//! `end = ms(t2)`, one synthetic sample is produced for every integer
//! millisecond strictly between them:
//!
//! ```text
//! lat(m) = lat1 + ((m - start) / (end - start)) · (lat2 - lat1)
//! ```
//!
//! Synthetic samples inherit the floor and building of `p1` and carry
//! [`SYNTHETIC_COUNTER`]. Original fixes are always emitted verbatim, once.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wifi_ips_core::time::{millis_to_seconds, to_millis};
use wifi_ips_core::{PositionSample, SYNTHETIC_COUNTER};

/// How pairs spanning a floor change are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationPolicy {
    /// Fill every consecutive pair.
    Unconditional,
    /// Fill only pairs on the same floor; never fabricate positions on a
    /// staircase or lift.
    FloorAware,
}

/// Internal, non-fatal interpolation failure.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InterpolationError {
    /// The pair is not strictly increasing on the millisecond grid.
    #[error("Degenerate interval: {t1} s .. {t2} s")]
    DegenerateInterval { t1: f64, t2: f64 },
}

/// Counters describing one interpolation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationStats {
    /// Original fixes in the output.
    pub originals: usize,
    /// Synthetic samples produced.
    pub synthetic: usize,
    /// Pairs skipped because they span a floor change.
    pub floor_transitions: usize,
    /// Pairs skipped because `Δt <= 0`.
    pub degenerate_pairs: usize,
}

/// Output of [`interpolate`].
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTrajectory {
    pub samples: Vec<PositionSample>,
    pub stats: InterpolationStats,
}

/// Synthetic samples strictly between `p1` and `p2`.
pub fn interpolate_pair(
    p1: &PositionSample,
    p2: &PositionSample,
) -> Result<Vec<PositionSample>, InterpolationError> {
    let start = to_millis(p1.timestamp);
    let end = to_millis(p2.timestamp);
    let delta = end - start;
    if delta <= 0 {
        return Err(InterpolationError::DegenerateInterval {
            t1: p1.timestamp,
            t2: p2.timestamp,
        });
    }

    let delta_f = delta as f64;
    Ok((start + 1..end)
        .map(|m| {
            let frac = (m - start) as f64 / delta_f;
            PositionSample {
                timestamp: millis_to_seconds(m),
                counter: SYNTHETIC_COUNTER,
                latitude: p1.latitude + frac * (p2.latitude - p1.latitude),
                longitude: p1.longitude + frac * (p2.longitude - p1.longitude),
                floor: p1.floor,
                building: p1.building,
            }
        })
        .collect())
}

/// Densify `samples` under `policy`.
///
/// Trajectories shorter than two fixes are returned unchanged.
pub fn interpolate(samples: &[PositionSample], policy: InterpolationPolicy) -> DenseTrajectory {
    let mut stats = InterpolationStats {
        originals: samples.len(),
        ..InterpolationStats::default()
    };
    if samples.len() < 2 {
        return DenseTrajectory { samples: samples.to_vec(), stats };
    }

    let mut out = Vec::with_capacity(samples.len());
    for pair in samples.windows(2) {
        let (p1, p2) = (&pair[0], &pair[1]);
        out.push(*p1);

        if policy == InterpolationPolicy::FloorAware && p1.floor != p2.floor {
            stats.floor_transitions += 1;
            tracing::debug!(
                t1 = p1.timestamp,
                t2 = p2.timestamp,
                from = %p1.floor,
                to = %p2.floor,
                "Skipping floor transition"
            );
            continue;
        }

        match interpolate_pair(p1, p2) {
            Ok(fill) => {
                stats.synthetic += fill.len();
                out.extend(fill);
            }
            Err(e) => {
                stats.degenerate_pairs += 1;
                tracing::debug!(error = %e, "Skipping pair");
            }
        }
    }
    if let Some(last) = samples.last() {
        out.push(*last);
    }

    DenseTrajectory { samples: out, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use wifi_ips_core::{BuildingId, FloorId};

    fn fix(t: f64, lat: f64, lon: f64, floor: i32) -> PositionSample {
        PositionSample {
            timestamp: t,
            counter: 7,
            latitude: lat,
            longitude: lon,
            floor: FloorId(floor),
            building: BuildingId(1),
        }
    }

    #[test]
    fn single_millisecond_gap_yields_midpoint() {
        let traj = [fix(0.0, 40.0, -3.0, 0), fix(0.002, 40.0002, -3.0002, 0)];
        let dense = interpolate(&traj, InterpolationPolicy::Unconditional);
        assert_eq!(dense.samples.len(), 3);
        let mid = dense.samples[1];
        assert_eq!(mid.timestamp, 0.001);
        assert_eq!(mid.counter, SYNTHETIC_COUNTER);
        assert_relative_eq!(mid.latitude, 40.0001, epsilon = 1e-12);
        assert_relative_eq!(mid.longitude, -3.0001, epsilon = 1e-12);
        assert_eq!(dense.stats.synthetic, 1);
    }

    #[test]
    fn synthetic_count_matches_millisecond_span() {
        for (t1, t2) in [(0.0, 1.0), (1.2345, 1.9), (10.001, 10.002), (3.5, 3.75)] {
            let fill = interpolate_pair(&fix(t1, 0.0, 0.0, 0), &fix(t2, 1.0, 1.0, 0)).unwrap();
            let expected = to_millis(t2) - to_millis(t1) - 1;
            assert_eq!(fill.len() as i64, expected, "pair ({t1}, {t2})");
        }
    }

    #[test]
    fn synthetic_samples_lie_on_the_segment_in_order() {
        let p1 = fix(5.0, 40.0, -3.0, 1);
        let p2 = fix(5.1, 40.001, -3.002, 1);
        let fill = interpolate_pair(&p1, &p2).unwrap();
        let mut last = p1.timestamp;
        for s in &fill {
            assert!(s.timestamp > last && s.timestamp < p2.timestamp);
            last = s.timestamp;
            let frac = (s.latitude - p1.latitude) / (p2.latitude - p1.latitude);
            let frac_lon = (s.longitude - p1.longitude) / (p2.longitude - p1.longitude);
            assert!((0.0..=1.0).contains(&frac));
            assert_relative_eq!(frac, frac_lon, epsilon = 1e-9);
            assert_eq!(s.floor, p1.floor);
            assert_eq!(s.building, p1.building);
        }
    }

    #[test]
    fn endpoints_are_preserved_verbatim() {
        let traj = [fix(0.0, 40.0, -3.0, 0), fix(0.01, 40.1, -3.1, 0), fix(0.02, 40.2, -3.2, 0)];
        let dense = interpolate(&traj, InterpolationPolicy::Unconditional);
        let originals: Vec<PositionSample> =
            dense.samples.iter().filter(|s| !s.is_synthetic()).copied().collect();
        assert_eq!(originals, traj.to_vec());
        assert_eq!(dense.samples.first(), traj.first());
        assert_eq!(dense.samples.last(), traj.last());
    }

    #[test]
    fn floor_change_suppresses_fill_but_keeps_endpoints() {
        let traj = [fix(0.0, 40.0, -3.0, 0), fix(1.0, 40.1, -3.1, 1)];
        let dense = interpolate(&traj, InterpolationPolicy::FloorAware);
        assert_eq!(dense.samples, traj.to_vec());
        assert_eq!(dense.stats.synthetic, 0);
        assert_eq!(dense.stats.floor_transitions, 1);
    }

    #[test]
    fn floor_aware_synthetic_samples_never_change_floor() {
        let traj = [
            fix(0.0, 40.0, -3.0, 0),
            fix(0.005, 40.1, -3.1, 0),
            fix(0.010, 40.2, -3.2, 1),
            fix(0.015, 40.3, -3.3, 1),
        ];
        let dense = interpolate(&traj, InterpolationPolicy::FloorAware);
        for s in dense.samples.iter().filter(|s| s.is_synthetic()) {
            let before = traj.iter().rev().find(|p| p.timestamp < s.timestamp).unwrap();
            let after = traj.iter().find(|p| p.timestamp > s.timestamp).unwrap();
            assert_eq!(before.floor, after.floor);
            assert_eq!(s.floor, before.floor);
        }
        // 4 + 4 synthetic between same-floor pairs, none across the change.
        assert_eq!(dense.stats.synthetic, 8);
        let mut ts: Vec<f64> = dense.samples.iter().map(|s| s.timestamp).collect();
        let len = ts.len();
        ts.dedup();
        assert_eq!(ts.len(), len, "no timestamp emitted twice");
    }

    #[test]
    fn unconditional_fills_across_floor_change_with_left_floor() {
        let traj = [fix(0.0, 40.0, -3.0, 0), fix(0.003, 40.3, -3.3, 2)];
        let dense = interpolate(&traj, InterpolationPolicy::Unconditional);
        assert_eq!(dense.stats.synthetic, 2);
        assert!(dense.samples[1..3].iter().all(|s| s.floor == FloorId(0)));
    }

    #[test]
    fn degenerate_interval_is_skipped() {
        let traj = [fix(1.0, 40.0, -3.0, 0), fix(1.0, 40.1, -3.1, 0), fix(1.0004, 40.2, -3.2, 0)];
        let dense = interpolate(&traj, InterpolationPolicy::Unconditional);
        assert_eq!(dense.samples, traj.to_vec());
        assert_eq!(dense.stats.degenerate_pairs, 2);
        assert!(matches!(
            interpolate_pair(&traj[1], &traj[0]),
            Err(InterpolationError::DegenerateInterval { .. })
        ));
    }

    #[test]
    fn short_trajectories_pass_through() {
        assert!(interpolate(&[], InterpolationPolicy::Unconditional).samples.is_empty());
        let one = [fix(3.0, 40.0, -3.0, 0)];
        assert_eq!(interpolate(&one, InterpolationPolicy::FloorAware).samples, one.to_vec());
    }
}

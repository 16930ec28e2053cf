//! Reading capture sessions from disk.
//!
//! A session is one capture log. Two line kinds are consumed; everything
//! else in a log (inertial sensors, GNSS, headers) is ignored:
//!
//! ```text
//! POSI;timestamp;counter;latitude;longitude;floor;building
//! WIFI;app_timestamp;sensor_timestamp;ssid;bssid;frequency;rss
//! ```
//!
//! Ground-truth files (name starting with the configured prefix, `GT_` by
//! default) are CSV with `timestamp,longitude,latitude,floor,counter` and
//! replace the positions of the session they are named after.
//!
//! Malformed records are rejected one by one and counted; they never abort
//! the session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use wifi_ips_core::time::{millis_key, round_timestamp};
use wifi_ips_core::{
    BssidId, BuildingId, CoreError, FloorId, PositionSample, SessionId, WifiScanSample,
};

use crate::config::TrainingConfig;
use crate::error::DatasetError;

const POSI_TAG: &str = "POSI";
const WIFI_TAG: &str = "WIFI";

/// Parsed content of one capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub session: SessionId,
    /// Position fixes ordered by timestamp, one per millisecond.
    pub positions: Vec<PositionSample>,
    pub scans: Vec<WifiScanSample>,
    /// Records rejected while reading.
    pub rejected: usize,
}

impl SessionData {
    pub fn new(session: SessionId) -> Self {
        Self { session, positions: Vec::new(), scans: Vec::new(), rejected: 0 }
    }

    /// Sort positions by time and drop fixes that repeat a millisecond.
    fn normalize(&mut self) {
        self.positions.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let before = self.positions.len();
        self.positions.dedup_by_key(|p| millis_key(p.timestamp));
        let dropped = before - self.positions.len();
        if dropped > 0 {
            tracing::warn!(
                session = %self.session,
                dropped,
                "Dropped position fixes with repeated timestamps"
            );
            self.rejected += dropped;
        }
    }
}

// ---------------------------------------------------------------------------
// Line parsers
// ---------------------------------------------------------------------------

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, CoreError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CoreError::malformed(field, format!("'{raw}' is not a number")))?;
    if !value.is_finite() {
        return Err(CoreError::malformed(field, format!("'{raw}' is not finite")));
    }
    Ok(value)
}

/// Integers are sometimes logged as `"2.0"`; accept those when integral.
fn parse_i64(field: &'static str, raw: &str) -> Result<i64, CoreError> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    let v = parse_f64(field, trimmed)?;
    if v.fract() != 0.0 {
        return Err(CoreError::malformed(field, format!("'{raw}' is not an integer")));
    }
    Ok(v as i64)
}

fn parse_i32(field: &'static str, raw: &str) -> Result<i32, CoreError> {
    let v = parse_i64(field, raw)?;
    i32::try_from(v).map_err(|_| CoreError::malformed(field, format!("{v} is out of range")))
}

fn parse_timestamp(field: &'static str, raw: &str) -> Result<f64, CoreError> {
    let t = parse_f64(field, raw)?;
    if t < 0.0 {
        return Err(CoreError::malformed(field, "must not be negative"));
    }
    Ok(round_timestamp(t))
}

fn parse_coordinates(lat: &str, lon: &str) -> Result<(f64, f64), CoreError> {
    let latitude = parse_f64("latitude", lat)?;
    let longitude = parse_f64("longitude", lon)?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(CoreError::malformed("latitude", format!("{latitude} outside [-90, 90]")));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(CoreError::malformed("longitude", format!("{longitude} outside [-180, 180]")));
    }
    Ok((latitude, longitude))
}

/// Parse a `POSI;...` line.
pub fn parse_posi_line(line: &str) -> Result<PositionSample, CoreError> {
    let fields: Vec<&str> = line.trim().split(';').collect();
    if fields.len() < 7 || fields[0] != POSI_TAG {
        let found = fields.len();
        return Err(CoreError::malformed("posi", format!("expected 7 fields, found {found}")));
    }
    let (latitude, longitude) = parse_coordinates(fields[3], fields[4])?;
    Ok(PositionSample {
        timestamp: parse_timestamp("timestamp", fields[1])?,
        counter: parse_i64("counter", fields[2])?,
        latitude,
        longitude,
        floor: FloorId(parse_i32("floor", fields[5])?),
        building: BuildingId(parse_i32("building", fields[6])?),
    })
}

/// Parse a `WIFI;...` line.
///
/// Fields are taken from both ends so an SSID containing `;` still parses.
pub fn parse_wifi_line(line: &str) -> Result<WifiScanSample, CoreError> {
    let fields: Vec<&str> = line.trim_end().split(';').collect();
    let n = fields.len();
    if n < 7 || fields[0] != WIFI_TAG {
        return Err(CoreError::malformed("wifi", format!("expected 7 fields, found {n}")));
    }
    let rss = parse_i32("rss", fields[n - 1])?;
    if rss > 0 {
        return Err(CoreError::malformed("rss", format!("{rss} dBm is positive")));
    }
    let frequency = parse_i64("frequency", fields[n - 2])?;
    Ok(WifiScanSample {
        app_timestamp: parse_timestamp("app_timestamp", fields[1])?,
        sensor_timestamp: parse_timestamp("sensor_timestamp", fields[2])?,
        ssid: fields[3..n - 3].join(";"),
        bssid: BssidId::parse(fields[n - 3])?,
        frequency: u32::try_from(frequency)
            .map_err(|_| {
                CoreError::malformed("frequency", format!("{frequency} is out of range"))
            })?,
        rss,
    })
}

/// Parse a ground-truth CSV line `timestamp,longitude,latitude,floor,counter`.
pub fn parse_ground_truth_line(
    line: &str,
    building: BuildingId,
) -> Result<PositionSample, CoreError> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() < 5 {
        let found = fields.len();
        return Err(CoreError::malformed(
            "ground_truth",
            format!("expected 5 fields, found {found}"),
        ));
    }
    let (latitude, longitude) = parse_coordinates(fields[2], fields[1])?;
    Ok(PositionSample {
        timestamp: parse_timestamp("timestamp", fields[0])?,
        counter: parse_i64("counter", fields[4])?,
        latitude,
        longitude,
        floor: FloorId(parse_i32("floor", fields[3])?),
        building,
    })
}

// ---------------------------------------------------------------------------
// Session assembly
// ---------------------------------------------------------------------------

/// Parse the text of a capture log.
pub fn parse_session_log(session: SessionId, path: &Path, text: &str) -> SessionData {
    let mut data = SessionData::new(session);
    for (i, line) in text.lines().enumerate() {
        let result = if line.starts_with(POSI_TAG) {
            parse_posi_line(line).map(|p| data.positions.push(p))
        } else if line.starts_with(WIFI_TAG) {
            parse_wifi_line(line).map(|s| data.scans.push(s))
        } else {
            continue;
        };
        if let Err(source) = result {
            data.rejected += 1;
            let err =
                DatasetError::MalformedRecord { path: path.to_path_buf(), line: i + 1, source };
            tracing::warn!(error = %err, "Rejected record");
        }
    }
    data.normalize();
    data
}

/// Parse the text of a ground-truth CSV, returning fixes and the reject count.
pub fn parse_ground_truth(
    path: &Path,
    text: &str,
    building: BuildingId,
) -> (Vec<PositionSample>, usize) {
    let mut fixes = Vec::new();
    let mut rejected = 0;
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_ground_truth_line(line, building) {
            Ok(p) => fixes.push(p),
            Err(source) => {
                rejected += 1;
                let err =
                    DatasetError::MalformedRecord { path: path.to_path_buf(), line: i + 1, source };
                tracing::warn!(error = %err, "Rejected ground-truth record");
            }
        }
    }
    (fixes, rejected)
}

/// Load a single capture log as a session named after its file stem.
pub fn load_session_file(path: &Path) -> Result<SessionData, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(parse_session_log(SessionId::new(name), path, &text))
}

#[derive(Default)]
struct SessionFiles {
    log: Option<PathBuf>,
    ground_truth: Option<PathBuf>,
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DatasetError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| DatasetError::io(dir, e))?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Session name of `path` relative to `root`: the relative path without
/// extension, using `/` separators and with the ground-truth prefix removed
/// from the file name.
fn session_name(root: &Path, path: &Path, gt_prefix: &str) -> Option<(String, bool)> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let (stem, is_gt) = match stem.strip_prefix(gt_prefix) {
        Some(rest) => (rest.to_owned(), true),
        None => (stem, false),
    };
    let parent = path.parent()?.strip_prefix(root).ok()?;
    let mut parts: Vec<String> = parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.push(stem);
    Some((parts.join("/"), is_gt))
}

/// Walk `config.data_dir` and load every session found, ordered by name.
pub fn discover_sessions(config: &TrainingConfig) -> Result<Vec<SessionData>, DatasetError> {
    let root = config.data_dir.as_path();
    if !root.is_dir() {
        return Err(DatasetError::DirectoryNotFound { path: root.to_path_buf() });
    }
    let mut files = Vec::new();
    collect_files(root, &mut files)?;

    let mut by_session: BTreeMap<String, SessionFiles> = BTreeMap::new();
    for path in files {
        let Some((name, is_gt)) = session_name(root, &path, &config.ground_truth_prefix) else {
            continue;
        };
        let entry = by_session.entry(name).or_default();
        if is_gt {
            entry.ground_truth = Some(path);
        } else {
            entry.log = Some(path);
        }
    }

    let sessions = by_session
        .into_par_iter()
        .map(|(name, files)| {
            load_session(SessionId::new(name), &files, config.ground_truth_building)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        dir = %root.display(),
        sessions = sessions.len(),
        rejected = sessions.iter().map(|s| s.rejected).sum::<usize>(),
        "Discovered sessions"
    );
    Ok(sessions)
}

fn load_session(
    session: SessionId,
    files: &SessionFiles,
    building: BuildingId,
) -> Result<SessionData, DatasetError> {
    let mut data = match &files.log {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
            parse_session_log(session, path, &text)
        }
        None => SessionData::new(session),
    };
    if let Some(path) = &files.ground_truth {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let (fixes, rejected) = parse_ground_truth(path, &text, building);
        data.positions = fixes;
        data.rejected += rejected;
        data.normalize();
    }
    tracing::debug!(
        session = %data.session,
        positions = data.positions.len(),
        scans = data.scans.len(),
        rejected = data.rejected,
        "Loaded session"
    );
    Ok(data)
}

//! Domain value types shared by the offline pipeline and the serving path.
//!
//! The types here are plain data: no I/O and no global state. Identifiers are
//! newtypes so a floor number can never be passed where a building number is
//! expected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::geometry::GeoPoint;

/// Counter value carried by samples synthesized by the interpolator.
pub const SYNTHETIC_COUNTER: i64 = -1;

// ---------------------------------------------------------------------------
// BssidId
// ---------------------------------------------------------------------------

/// A BSSID wrapping the 6-byte MAC address of an access point radio.
///
/// Parsing accepts upper or lower case hex; display is always lowercase, so
/// the byte ordering of `BssidId` equals the lexicographic ordering of its
/// text form. Sorting BSSIDs therefore yields the canonical column order of a
/// fingerprint vector.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BssidId(pub [u8; 6]);

impl BssidId {
    /// Parse a colon-separated MAC such as `"aa:bb:cc:dd:ee:ff"`.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        let mut bytes = [0u8; 6];
        let mut count = 0usize;
        for part in trimmed.split(':') {
            if count == 6 {
                let reason = format!("too many octets in '{trimmed}'");
                return Err(CoreError::malformed("bssid", reason));
            }
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                let reason = format!("invalid octet '{part}' in '{trimmed}'");
                return Err(CoreError::malformed("bssid", reason));
            }
            bytes[count] = u8::from_str_radix(part, 16)
                .map_err(|e| CoreError::malformed("bssid", e.to_string()))?;
            count += 1;
        }
        if count != 6 {
            return Err(CoreError::malformed(
                "bssid",
                format!("expected 6 octets in '{trimmed}', found {count}"),
            ));
        }
        Ok(Self(bytes))
    }

    /// Return the raw 6-byte MAC address.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Debug for BssidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BssidId({self})")
    }
}

impl fmt::Display for BssidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for BssidId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BssidId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BssidId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Floor number within a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorId(pub i32);

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Building number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub i32);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the device reporting live scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Name of one capture session (trial), e.g. `"TrainingTrial3"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the session name contains `marker`.
    pub fn matches(&self, marker: &str) -> bool {
        !marker.is_empty() && self.0.contains(marker)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a capture session takes part in the offline pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Ground-truth walk: densified, then joined on exact timestamps.
    Training,
    /// Test or scoring walk: raw fixes joined on the last preceding scan.
    Evaluation,
}

impl SessionRole {
    /// Derive the role from the session name and the training marker.
    pub fn classify(session: &SessionId, training_marker: &str) -> Self {
        if session.matches(training_marker) {
            Self::Training
        } else {
            Self::Evaluation
        }
    }
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// A ground-truth position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Seconds since session start (3-decimal precision).
    pub timestamp: f64,
    /// Capture counter, or [`SYNTHETIC_COUNTER`] for interpolated samples.
    pub counter: i64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Floor of the fix.
    pub floor: FloorId,
    /// Building of the fix.
    pub building: BuildingId,
}

impl PositionSample {
    /// Returns `true` if the sample was produced by interpolation.
    pub fn is_synthetic(&self) -> bool {
        self.counter == SYNTHETIC_COUNTER
    }

    /// The geographic location of the fix.
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One access point observed in one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiScanSample {
    /// Application timestamp in seconds; shared by every AP of one scan.
    pub app_timestamp: f64,
    /// Sensor timestamp in seconds.
    pub sensor_timestamp: f64,
    /// Network name.
    pub ssid: String,
    /// Access point identifier.
    pub bssid: BssidId,
    /// Channel centre frequency in MHz.
    pub frequency: u32,
    /// Received signal strength in dBm.
    pub rss: i32,
}

/// One labeled (position, access point, signal strength) observation.
///
/// Unique per `(session, position_timestamp, bssid)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRow {
    pub session: SessionId,
    pub position_timestamp: f64,
    pub scan_timestamp: f64,
    pub bssid: BssidId,
    pub rss: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub floor: FloorId,
}

impl FingerprintRow {
    /// The labeled location of the row.
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// A live `(bssid, rss)` pair reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub bssid: BssidId,
    pub rss: f64,
}

// ---------------------------------------------------------------------------
// Estimates and device state
// ---------------------------------------------------------------------------

/// An estimated position: coordinates plus floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub location: GeoPoint,
    pub floor: FloorId,
}

/// Last known position of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device: DeviceId,
    pub estimate: PositionEstimate,
    pub last_update: DateTime<Utc>,
}

/// A served estimate together with the fingerprint it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub device: DeviceId,
    pub estimate: PositionEstimate,
    pub timestamp: DateTime<Utc>,
    pub measurements: Vec<Measurement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bssid_parse_is_case_insensitive_and_displays_lowercase() {
        let upper = BssidId::parse("AA:BB:CC:0D:0E:0F").unwrap();
        let lower = BssidId::parse("aa:bb:cc:0d:0e:0f").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "aa:bb:cc:0d:0e:0f");
    }

    #[test]
    fn bssid_rejects_malformed_text() {
        assert!(BssidId::parse("aa:bb:cc:dd:ee").is_err());
        assert!(BssidId::parse("aa:bb:cc:dd:ee:ff:00").is_err());
        assert!(BssidId::parse("aa:bb:cc:dd:ee:gg").is_err());
        assert!(BssidId::parse("aa:bb:cc:dd::ff").is_err());
        assert!(BssidId::parse("+a:bb:cc:dd:ee:ff").is_err());
    }

    #[test]
    fn bssid_order_matches_text_order() {
        let mut ids: Vec<BssidId> = ["0a:00:00:00:00:01", "00:ff:00:00:00:00", "0a:00:00:00:00:00"]
            .iter()
            .map(|s| BssidId::parse(s).unwrap())
            .collect();
        ids.sort();
        let text: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let mut sorted_text = text.clone();
        sorted_text.sort();
        assert_eq!(text, sorted_text);
    }

    #[test]
    fn bssid_serializes_as_string() {
        let id = BssidId::parse("00:11:22:33:44:55").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00:11:22:33:44:55\"");
        let back: BssidId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn session_role_follows_marker() {
        let train = SessionId::new("TrainingTrial3");
        let test = SessionId::new("TestingTrial1");
        assert_eq!(SessionRole::classify(&train, "TrainingTrial"), SessionRole::Training);
        assert_eq!(SessionRole::classify(&test, "TrainingTrial"), SessionRole::Evaluation);
        assert_eq!(SessionRole::classify(&train, ""), SessionRole::Evaluation);
    }

    #[test]
    fn synthetic_counter_marks_interpolated_samples() {
        let sample = PositionSample {
            timestamp: 1.0,
            counter: SYNTHETIC_COUNTER,
            latitude: 40.0,
            longitude: -3.0,
            floor: FloorId(0),
            building: BuildingId(1),
        };
        assert!(sample.is_synthetic());
        assert_eq!(sample.location(), GeoPoint::new(40.0, -3.0));
    }
}

//! Timestamp helpers.
//!
//! Session timestamps are seconds as `f64` with millisecond resolution.
//! Two conversions to integer milliseconds exist and are not interchangeable:
//!
//! - [`to_millis`] floors, and defines the interpolation grid.
//! - [`millis_key`] rounds, and defines timestamp equality for joins.

/// Tolerance added before flooring so that values such as `0.002` (stored
/// as `0.001999…`) land on their intended millisecond.
const MILLIS_EPSILON: f64 = 1e-6;

/// Round a timestamp to 3 decimal places.
pub fn round_timestamp(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Millisecond index of `seconds` on the interpolation grid (`floor(t·1000)`).
pub fn to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0 + MILLIS_EPSILON).floor() as i64
}

/// Equality key of a timestamp at millisecond granularity.
pub fn millis_key(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Seconds value of a millisecond index.
pub fn millis_to_seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_keeps_three_decimals() {
        assert_eq!(round_timestamp(12.34567), 12.346);
        assert_eq!(round_timestamp(0.0004), 0.0);
    }

    #[test]
    fn to_millis_floors() {
        assert_eq!(to_millis(1.2345), 1234);
        assert_eq!(to_millis(0.002), 2);
        assert_eq!(to_millis(0.0), 0);
        assert_eq!(to_millis(17.9999), 17999);
    }

    #[test]
    fn millis_key_matches_rounded_timestamps() {
        assert_eq!(millis_key(3.0004), millis_key(3.0));
        assert_ne!(millis_key(3.001), millis_key(3.0));
        assert_eq!(millis_to_seconds(millis_key(5.125)), 5.125);
    }
}

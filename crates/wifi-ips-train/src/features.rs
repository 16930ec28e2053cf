//! Fixed-length fingerprint vectors.
//!
//! A [`ColumnUniverse`] is the frozen, sorted list of BSSIDs a model was
//! trained on. [`vectorize`] maps any scan group onto that universe, filling
//! unobserved access points with [`MISSING_RSS`] and silently dropping
//! access points the universe does not know.

use std::collections::{BTreeMap, HashMap};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use wifi_ips_core::time::millis_key;
use wifi_ips_core::{BssidId, CoreError, FingerprintRow, FloorId, GeoPoint, SessionId};

/// Signal strength standing in for "access point not observed".
pub const MISSING_RSS: f64 = -120.0;

// ---------------------------------------------------------------------------
// ColumnUniverse
// ---------------------------------------------------------------------------

/// Ordered set of BSSIDs defining feature column positions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnUniverse {
    columns: Vec<BssidId>,
}

impl ColumnUniverse {
    /// Build a universe from every BSSID in `bssids`, sorted and distinct.
    pub fn from_bssids<I>(bssids: I) -> Self
    where
        I: IntoIterator<Item = BssidId>,
    {
        let mut columns: Vec<BssidId> = bssids.into_iter().collect();
        columns.sort_unstable();
        columns.dedup();
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[BssidId] {
        &self.columns
    }

    /// Column position of `bssid`, if it is part of the universe.
    pub fn index_of(&self, bssid: &BssidId) -> Option<usize> {
        self.columns.binary_search(bssid).ok()
    }

    /// Serialize as one BSSID per line.
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(self.columns.len() * 18);
        for bssid in &self.columns {
            out.push_str(&bssid.to_string());
            out.push('\n');
        }
        out
    }

    /// Parse the one-BSSID-per-line form written by [`to_csv`](Self::to_csv).
    ///
    /// The order is kept verbatim and must already be strictly ascending.
    pub fn from_csv(text: &str) -> Result<Self, CoreError> {
        let columns = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(BssidId::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(pair) = columns.windows(2).find(|w| w[0] >= w[1]) {
            return Err(CoreError::malformed(
                "columns",
                format!("{} does not sort after {}", pair[1], pair[0]),
            ));
        }
        Ok(Self { columns })
    }
}

// ---------------------------------------------------------------------------
// Vectorization
// ---------------------------------------------------------------------------

/// Map a scan group onto `universe`.
///
/// Duplicate BSSIDs resolve last-wins. The output length always equals
/// `universe.len()`.
pub fn vectorize<I>(group: I, universe: &ColumnUniverse) -> Array1<f64>
where
    I: IntoIterator<Item = (BssidId, f64)>,
{
    let observed: HashMap<BssidId, f64> = group.into_iter().collect();
    universe
        .columns()
        .iter()
        .map(|bssid| observed.get(bssid).copied().unwrap_or(MISSING_RSS))
        .collect()
}

/// Number of BSSIDs in `group` that `universe` does not contain.
pub fn unknown_count<'a, I>(group: I, universe: &ColumnUniverse) -> usize
where
    I: IntoIterator<Item = &'a BssidId>,
{
    group.into_iter().filter(|b| universe.index_of(b).is_none()).count()
}

// ---------------------------------------------------------------------------
// FeatureMatrix
// ---------------------------------------------------------------------------

/// Identity and labels of one pivoted fingerprint sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub session: SessionId,
    pub position_timestamp: f64,
    pub location: GeoPoint,
    pub floor: FloorId,
}

/// Fingerprint rows pivoted into one feature row per labeled position.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub features: Array2<f64>,
    pub samples: Vec<LabeledSample>,
}

impl FeatureMatrix {
    /// Pivot `rows` over `universe`.
    ///
    /// One output row per `(session, position_timestamp)`, ordered by session
    /// then timestamp.
    pub fn build(rows: &[FingerprintRow], universe: &ColumnUniverse) -> Self {
        let mut groups: BTreeMap<(&SessionId, i64), Vec<&FingerprintRow>> = BTreeMap::new();
        for row in rows {
            groups
                .entry((&row.session, millis_key(row.position_timestamp)))
                .or_default()
                .push(row);
        }

        let mut features = Array2::from_elem((groups.len(), universe.len()), MISSING_RSS);
        let mut samples = Vec::with_capacity(groups.len());
        for (i, group) in groups.values().enumerate() {
            let vector = vectorize(group.iter().map(|r| (r.bssid, f64::from(r.rss))), universe);
            features.row_mut(i).assign(&vector);
            let first = group[0];
            samples.push(LabeledSample {
                session: first.session.clone(),
                position_timestamp: first.position_timestamp,
                location: first.location(),
                floor: first.floor,
            });
        }
        Self { features, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> BssidId {
        BssidId::parse(s).unwrap()
    }

    fn universe() -> ColumnUniverse {
        let bssids = ["00:00:00:00:00:02", "00:00:00:00:00:01", "00:00:00:00:00:03"];
        ColumnUniverse::from_bssids(bssids.map(b))
    }

    #[test]
    fn universe_is_sorted_and_distinct() {
        let bssids = ["00:00:00:00:00:02", "00:00:00:00:00:01", "00:00:00:00:00:02"];
        let u = ColumnUniverse::from_bssids(bssids.map(b));
        assert_eq!(u.columns(), &[b("00:00:00:00:00:01"), b("00:00:00:00:00:02")]);
    }

    #[test]
    fn index_of_round_trips() {
        let u = universe();
        for (i, bssid) in u.columns().iter().enumerate() {
            assert_eq!(u.index_of(bssid), Some(i));
            assert_eq!(u.columns()[u.index_of(bssid).unwrap()], *bssid);
        }
        assert_eq!(u.index_of(&b("ff:ff:ff:ff:ff:ff")), None);
    }

    #[test]
    fn every_column_holds_reported_rss_or_sentinel() {
        let u = ColumnUniverse::from_bssids((1..=6).map(|n| b(&format!("00:00:00:00:00:0{n}"))));
        let group = [
            (b("00:00:00:00:00:05"), -48.0),
            (b("00:00:00:00:00:02"), -80.0),
            (b("ee:ee:ee:ee:ee:ee"), -20.0),
            (b("00:00:00:00:00:02"), -66.0),
            (b("00:00:00:00:00:06"), -91.5),
        ];
        let v = vectorize(group, &u);
        assert_eq!(v.len(), u.len());

        // Last report of a duplicated BSSID wins.
        let mut expected: HashMap<BssidId, f64> = HashMap::new();
        for (bssid, rss) in group {
            expected.insert(bssid, rss);
        }
        for (i, bssid) in u.columns().iter().enumerate() {
            let want = expected.get(bssid).copied().unwrap_or(MISSING_RSS);
            assert_eq!(v[i], want, "column {i} ({bssid})");
        }
        assert_eq!(v[u.index_of(&b("00:00:00:00:00:02")).unwrap()], -66.0);
        assert_eq!(v.iter().filter(|&&x| x == MISSING_RSS).count(), 3);

        let unknown = unknown_count(group.iter().map(|(bssid, _)| bssid), &u);
        assert_eq!(unknown, 1);
    }

    #[test]
    fn vectorize_fills_sentinel_and_drops_unknown() {
        let v = vectorize(
            [
                (b("00:00:00:00:00:01"), -50.0),
                (b("00:00:00:00:00:02"), -70.0),
                (b("ff:00:00:00:00:00"), -30.0),
            ],
            &universe(),
        );
        assert_eq!(v.to_vec(), vec![-50.0, -70.0, MISSING_RSS]);
    }

    #[test]
    fn vectorize_is_pure_and_fixed_length() {
        let u = universe();
        let group = [(b("00:00:00:00:00:03"), -61.0)];
        let a = vectorize(group, &u);
        let c = vectorize(group, &u);
        assert_eq!(a, c);
        assert_eq!(a.len(), u.len());
        assert_eq!(vectorize(std::iter::empty(), &u).to_vec(), vec![MISSING_RSS; 3]);
    }

    #[test]
    fn duplicate_bssid_resolves_last_wins() {
        let v = vectorize(
            [(b("00:00:00:00:00:01"), -50.0), (b("00:00:00:00:00:01"), -40.0)],
            &universe(),
        );
        assert_eq!(v[0], -40.0);
    }

    #[test]
    fn csv_round_trip_keeps_order() {
        let u = universe();
        let back = ColumnUniverse::from_csv(&u.to_csv()).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn csv_rejects_unsorted_columns() {
        let err = ColumnUniverse::from_csv("00:00:00:00:00:02\n00:00:00:00:00:01\n").unwrap_err();
        assert!(err.is_record_level());
    }

    #[test]
    fn unknown_count_ignores_known_columns() {
        let u = universe();
        let seen = [b("00:00:00:00:00:01"), b("aa:00:00:00:00:00")];
        assert_eq!(unknown_count(&seen, &u), 1);
    }

    #[test]
    fn feature_matrix_pivots_per_position() {
        let row = |ts: f64, bssid: &str, rss: i32, floor: i32| FingerprintRow {
            session: SessionId::new("TrainingTrial1"),
            position_timestamp: ts,
            scan_timestamp: ts,
            bssid: b(bssid),
            rss,
            latitude: 40.0 + ts,
            longitude: -3.0,
            floor: FloorId(floor),
        };
        let rows = vec![
            row(2.0, "00:00:00:00:00:03", -80, 1),
            row(1.0, "00:00:00:00:00:01", -50, 0),
            row(1.0, "00:00:00:00:00:02", -70, 0),
        ];
        let m = FeatureMatrix::build(&rows, &universe());
        assert_eq!(m.len(), 2);
        assert_eq!(m.features.row(0).to_vec(), vec![-50.0, -70.0, MISSING_RSS]);
        assert_eq!(m.features.row(1).to_vec(), vec![MISSING_RSS, MISSING_RSS, -80.0]);
        assert_eq!(m.samples[0].floor, FloorId(0));
        assert_eq!(m.samples[1].location, GeoPoint::new(42.0, -3.0));
    }
}

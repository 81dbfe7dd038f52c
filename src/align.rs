//! Nearest-timestamp joins between irregularly sampled series.

use chrono::{DateTime, TimeDelta, Utc};
use std::borrow::Cow;

use crate::series::Sample;

/// One joined instant: the primary timestamp and one value per input series,
/// in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub ts: DateTime<Utc>,
    pub values: Vec<f64>,
}

impl AlignedRow {
    pub fn value(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied()
    }
}

fn sorted(samples: &[Sample]) -> Cow<'_, [Sample]> {
    if samples.windows(2).all(|w| w[0].ts <= w[1].ts) {
        Cow::Borrowed(samples)
    } else {
        let mut owned = samples.to_vec();
        owned.sort_by_key(|sample| sample.ts);
        Cow::Owned(owned)
    }
}

/// Index of the sample nearest to `ts`; the earlier one wins a tie.
fn nearest(samples: &[Sample], ts: DateTime<Utc>) -> Option<usize> {
    if samples.is_empty() {
        return None;
    }
    let upper = samples.partition_point(|sample| sample.ts < ts);
    match (upper.checked_sub(1), (upper < samples.len()).then_some(upper)) {
        (Some(before), Some(after)) => {
            let before_gap = ts - samples[before].ts;
            let after_gap = samples[after].ts - ts;
            Some(if after_gap < before_gap { after } else { before })
        }
        (Some(before), None) => Some(before),
        (None, Some(after)) => Some(after),
        (None, None) => None,
    }
}

fn within_tolerance(a: DateTime<Utc>, b: DateTime<Utc>, tolerance_seconds: i64) -> bool {
    let gap = a.signed_duration_since(b).abs();
    TimeDelta::try_seconds(tolerance_seconds.max(0)).map_or(true, |tolerance| gap <= tolerance)
}

/// Appends the nearest `secondary` value to every row, dropping rows with no
/// match inside the tolerance. The rows' timestamps stay the primary axis.
pub fn join_rows(rows: &[AlignedRow], secondary: &[Sample], tolerance_seconds: i64) -> Vec<AlignedRow> {
    if rows.is_empty() || secondary.is_empty() {
        return Vec::new();
    }
    let secondary = sorted(secondary);
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(idx) = nearest(&secondary, row.ts) else {
            continue;
        };
        let matched = secondary[idx];
        if !within_tolerance(row.ts, matched.ts, tolerance_seconds) {
            continue;
        }
        let mut values = Vec::with_capacity(row.values.len() + 1);
        values.extend_from_slice(&row.values);
        values.push(matched.value);
        out.push(AlignedRow { ts: row.ts, values });
    }
    out
}

pub fn rows_from(samples: &[Sample]) -> Vec<AlignedRow> {
    sorted(samples)
        .iter()
        .map(|sample| AlignedRow {
            ts: sample.ts,
            values: vec![sample.value],
        })
        .collect()
}

/// Two-series join: `values = [primary, secondary]`.
pub fn align_nearest(primary: &[Sample], secondary: &[Sample], tolerance_seconds: i64) -> Vec<AlignedRow> {
    if primary.is_empty() || secondary.is_empty() {
        return Vec::new();
    }
    join_rows(&rows_from(primary), secondary, tolerance_seconds)
}

/// Chains joins left to right. The first series sets the time axis.
pub fn align_many(series: &[&[Sample]], tolerance_seconds: i64) -> Vec<AlignedRow> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };
    let mut rows = rows_from(first);
    for secondary in rest {
        if rows.is_empty() {
            break;
        }
        rows = join_rows(&rows, secondary, tolerance_seconds);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 24, 8, 0, 0)
            .single()
            .expect("valid utc")
    }

    fn at(seconds: i64, value: f64) -> Sample {
        Sample::new(base() + Duration::seconds(seconds), value)
    }

    #[test]
    fn empty_inputs_align_to_nothing() {
        let series = vec![at(0, 1.0), at(60, 2.0)];
        assert!(align_nearest(&series, &[], 30).is_empty());
        assert!(align_nearest(&[], &series, 30).is_empty());
        assert!(align_many(&[], 30).is_empty());
    }

    #[test]
    fn picks_the_nearest_match() {
        let primary = vec![at(0, 70.0), at(300, 71.0)];
        let secondary = vec![at(-20, 1.0), at(10, 2.0), at(290, 3.0), at(330, 4.0)];
        let rows = align_nearest(&primary, &secondary, 30);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![70.0, 2.0]);
        assert_eq!(rows[1].values, vec![71.0, 3.0]);
        assert_eq!(rows[1].ts, base() + Duration::seconds(300));
    }

    #[test]
    fn never_pairs_outside_tolerance() {
        let primary: Vec<Sample> = (0..50).map(|i| at(i * 47, i as f64)).collect();
        let secondary: Vec<Sample> = (0..40).map(|i| at(i * 61 + 7, i as f64)).collect();
        let rows = align_nearest(&primary, &secondary, 15);
        assert!(!rows.is_empty());
        for row in &rows {
            let matched = secondary
                .iter()
                .find(|s| s.value == row.values[1])
                .expect("matched sample");
            let gap = (row.ts - matched.ts).num_seconds().abs();
            assert!(gap <= 15, "gap {gap}s exceeds tolerance");
        }
    }

    #[test]
    fn boundary_gap_is_kept() {
        let rows = align_nearest(&[at(0, 1.0)], &[at(30, 2.0)], 30);
        assert_eq!(rows.len(), 1);
        let rows = align_nearest(&[at(0, 1.0)], &[at(31, 2.0)], 30);
        assert!(rows.is_empty());
    }

    #[test]
    fn sub_millisecond_overshoot_is_dropped() {
        let late = Sample::new(base() + Duration::seconds(30) + Duration::microseconds(900), 2.0);
        assert!(align_nearest(&[at(0, 1.0)], &[late], 30).is_empty());
        let early = Sample::new(base() - Duration::seconds(30) - Duration::nanoseconds(1), 2.0);
        assert!(align_nearest(&[at(0, 1.0)], &[early], 30).is_empty());
    }

    #[test]
    fn ties_prefer_the_earlier_sample() {
        let rows = align_nearest(&[at(10, 0.0)], &[at(0, 1.0), at(20, 2.0)], 30);
        assert_eq!(rows[0].values, vec![0.0, 1.0]);
    }

    #[test]
    fn unsorted_inputs_are_sorted_first() {
        let primary = vec![at(120, 3.0), at(0, 1.0), at(60, 2.0)];
        let secondary = vec![at(61, 20.0), at(121, 30.0), at(1, 10.0)];
        let rows = align_nearest(&primary, &secondary, 5);
        let pairs: Vec<(f64, f64)> = rows.iter().map(|r| (r.values[0], r.values[1])).collect();
        assert_eq!(pairs, vec![(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]);
    }

    #[test]
    fn chained_joins_keep_the_first_axis() {
        let temp = vec![at(0, 70.0), at(300, 71.0), at(600, 72.0)];
        let setpoint = vec![at(5, 72.0), at(305, 72.0)];
        let reheat = vec![at(-5, 0.0), at(590, 40.0)];
        let rows = align_many(&[&temp, &setpoint, &reheat], 30);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ts, base());
        assert_eq!(rows[0].values, vec![70.0, 72.0, 0.0]);
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stats::percent;
use crate::config::CycleConfig;
use crate::series::Sample;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CycleMetrics {
    pub samples: usize,
    pub on_pct: Option<f64>,
    pub short_cycle_count: Option<usize>,
}

/// Thresholds one series into ON/OFF and counts ON periods shorter than
/// `min_cycle_minutes`. The first sample only seeds the state.
pub fn compute_binary_cycles(samples: &[Sample], cfg: &CycleConfig) -> CycleMetrics {
    let mut ordered: Vec<Sample> = samples
        .iter()
        .copied()
        .filter(|sample| sample.value.is_finite())
        .collect();
    if ordered.is_empty() {
        return CycleMetrics::default();
    }
    ordered.sort_by_key(|sample| sample.ts);

    let is_on = |sample: &Sample| sample.value > cfg.on_threshold;
    let on_count = ordered.iter().filter(|sample| is_on(sample)).count();

    let mut short_cycles = 0usize;
    let mut prev_on = is_on(&ordered[0]);
    let mut on_start: Option<DateTime<Utc>> = prev_on.then_some(ordered[0].ts);
    for sample in &ordered[1..] {
        let on = is_on(sample);
        if on == prev_on {
            continue;
        }
        if on {
            on_start = Some(sample.ts);
        } else if let Some(start) = on_start.take() {
            let minutes = (sample.ts - start).num_milliseconds() as f64 / 60_000.0;
            if minutes < cfg.min_cycle_minutes {
                short_cycles += 1;
            }
        }
        prev_on = on;
    }

    CycleMetrics {
        samples: ordered.len(),
        on_pct: percent(on_count, ordered.len()),
        short_cycle_count: Some(short_cycles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(points: &[(i64, f64)]) -> Vec<Sample> {
        let base = Utc
            .with_ymd_and_hms(2025, 11, 24, 6, 0, 0)
            .single()
            .expect("valid utc");
        points
            .iter()
            .map(|(minute, value)| Sample::new(base + Duration::minutes(*minute), *value))
            .collect()
    }

    #[test]
    fn empty_series_is_no_data() {
        assert_eq!(
            compute_binary_cycles(&[], &CycleConfig::default()),
            CycleMetrics::default()
        );
    }

    #[test]
    fn on_period_of_exactly_the_minimum_is_not_short() {
        let metrics = compute_binary_cycles(
            &series(&[(0, 0.0), (5, 1.0), (15, 0.0)]),
            &CycleConfig::default(),
        );
        assert_eq!(metrics.short_cycle_count, Some(0));
    }

    #[test]
    fn shorter_on_period_counts_once() {
        let metrics = compute_binary_cycles(
            &series(&[(0, 0.0), (5, 1.0), (6, 1.0), (14, 0.0), (20, 0.0)]),
            &CycleConfig::default(),
        );
        assert_eq!(metrics.short_cycle_count, Some(1));
        assert_eq!(metrics.samples, 5);
        assert_eq!(metrics.on_pct, Some(40.0));
    }

    #[test]
    fn first_sample_seeds_without_counting() {
        // Starts ON: the period from the first sample still ends in a cycle.
        let starts_on = compute_binary_cycles(&series(&[(0, 1.0), (3, 0.0)]), &CycleConfig::default());
        assert_eq!(starts_on.short_cycle_count, Some(1));

        // A lone OFF sample is not a transition.
        let single = compute_binary_cycles(&series(&[(0, 0.0)]), &CycleConfig::default());
        assert_eq!(single.short_cycle_count, Some(0));
        assert_eq!(single.on_pct, Some(0.0));
    }

    #[test]
    fn unterminated_on_period_is_not_counted() {
        let metrics = compute_binary_cycles(
            &series(&[(0, 0.0), (1, 1.0), (2, 0.0), (3, 1.0)]),
            &CycleConfig::default(),
        );
        assert_eq!(metrics.short_cycle_count, Some(1));
    }

    #[test]
    fn threshold_is_strictly_greater() {
        let metrics = compute_binary_cycles(
            &series(&[(0, 0.5), (1, 0.51), (2, 0.5)]),
            &CycleConfig::default(),
        );
        assert_eq!(metrics.short_cycle_count, Some(1));
        let on_pct = metrics.on_pct.expect("on pct");
        assert!((on_pct - 100.0 / 3.0).abs() < 1e-9);
    }
}

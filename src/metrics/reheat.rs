use serde::Serialize;

use super::stats::percent;
use crate::align::AlignedRow;
use crate::config::ReheatConfig;
use crate::time::OccupiedWindow;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReheatMetrics {
    /// Occupied rows considered.
    pub samples: usize,
    pub reheat_on_samples: usize,
    pub waste_samples: usize,
    /// Share of reheat-on rows where the space was already above setpoint plus
    /// the deadband. Absent when reheat was never on.
    pub waste_pct: Option<f64>,
}

/// `rows` carry `[temperature, setpoint, reheat_output]`.
pub fn compute_reheat_waste(
    rows: &[AlignedRow],
    window: &OccupiedWindow,
    cfg: &ReheatConfig,
) -> ReheatMetrics {
    let mut metrics = ReheatMetrics::default();
    for row in rows.iter().filter(|row| window.contains(row.ts)) {
        let (Some(temp), Some(setpoint), Some(reheat)) = (row.value(0), row.value(1), row.value(2))
        else {
            continue;
        };
        if !(temp.is_finite() && setpoint.is_finite() && reheat.is_finite()) {
            continue;
        }
        metrics.samples += 1;
        if reheat <= cfg.on_threshold {
            continue;
        }
        metrics.reheat_on_samples += 1;
        if temp > setpoint + cfg.deadband {
            metrics.waste_samples += 1;
        }
    }
    metrics.waste_pct = percent(metrics.waste_samples, metrics.reheat_on_samples);
    metrics
}

use serde::Serialize;

use super::stats::{mean, percent};
use crate::align::AlignedRow;
use crate::config::FlowTrackingConfig;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FlowMetrics {
    pub samples: usize,
    pub within_band_pct: Option<f64>,
    /// Mean of flow minus setpoint, in flow units.
    pub mean_error: Option<f64>,
    /// Mean of |error| / setpoint * 100 over rows with a non-zero setpoint.
    pub mean_abs_error_pct: Option<f64>,
}

impl FlowMetrics {
    /// A flow series with nothing to compare against.
    pub fn without_setpoint(flow_samples: usize) -> Self {
        Self {
            samples: flow_samples,
            ..Self::default()
        }
    }
}

fn tolerance(setpoint: f64, cfg: &FlowTrackingConfig) -> f64 {
    let relative = cfg.pct_tolerance * setpoint.abs();
    match cfg.abs_tolerance {
        Some(abs) => relative.max(abs),
        None => relative,
    }
}

/// `rows` carry `[flow, setpoint]`.
pub fn compute_flow_tracking(rows: &[AlignedRow], cfg: &FlowTrackingConfig) -> FlowMetrics {
    let pairs: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| Some((row.value(0)?, row.value(1)?)))
        .filter(|(flow, sp)| flow.is_finite() && sp.is_finite())
        .collect();
    if pairs.is_empty() {
        return FlowMetrics::default();
    }

    let mut errors = Vec::with_capacity(pairs.len());
    let mut error_pcts = Vec::new();
    let mut within = 0usize;
    for (flow, sp) in &pairs {
        let error = flow - sp;
        if error.abs() <= tolerance(*sp, cfg) {
            within += 1;
        }
        if *sp != 0.0 {
            error_pcts.push((error / sp).abs() * 100.0);
        }
        errors.push(error);
    }

    FlowMetrics {
        samples: pairs.len(),
        within_band_pct: percent(within, pairs.len()),
        mean_error: mean(&errors),
        mean_abs_error_pct: mean(&error_pcts),
    }
}

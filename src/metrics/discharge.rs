use serde::Serialize;

use super::stats::{mean, percent};
use crate::align::AlignedRow;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DischargeMetrics {
    pub samples: usize,
    pub within_band_pct: Option<f64>,
    pub mean_error: Option<f64>,
}

/// `rows` carry `[discharge_air, discharge_air_setpoint]`. No occupancy filter.
pub fn compute_discharge_tracking(rows: &[AlignedRow], band: f64) -> DischargeMetrics {
    let errors: Vec<f64> = rows
        .iter()
        .filter_map(|row| Some(row.value(0)? - row.value(1)?))
        .filter(|err| err.is_finite())
        .collect();
    if errors.is_empty() {
        return DischargeMetrics::default();
    }
    let within = errors.iter().filter(|err| err.abs() <= band).count();
    DischargeMetrics {
        samples: errors.len(),
        within_band_pct: percent(within, errors.len()),
        mean_error: mean(&errors),
    }
}

use serde::Serialize;

use super::stats::{mean, percent};
use crate::align::AlignedRow;
use crate::time::OccupiedWindow;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComfortMetrics {
    pub samples: usize,
    pub within_band_pct: Option<f64>,
    /// Mean of temperature minus setpoint.
    pub mean_error: Option<f64>,
}

/// `rows` carry `[temperature, setpoint]`. Only rows inside the occupied window count.
pub fn compute_comfort(rows: &[AlignedRow], window: &OccupiedWindow, band: f64) -> ComfortMetrics {
    let errors: Vec<f64> = rows
        .iter()
        .filter(|row| window.contains(row.ts))
        .filter_map(|row| Some(row.value(0)? - row.value(1)?))
        .filter(|err| err.is_finite())
        .collect();
    if errors.is_empty() {
        return ComfortMetrics::default();
    }

    let within = errors.iter().filter(|err| err.abs() <= band).count();
    ComfortMetrics {
        samples: errors.len(),
        within_band_pct: percent(within, errors.len()),
        mean_error: mean(&errors),
    }
}

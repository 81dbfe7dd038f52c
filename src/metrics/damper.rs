//! Damper position versus measured airflow.
//!
//! A box whose damper is wide open while little air moves, or shut while a lot
//! of air moves, points at a leaking or stuck actuator. "Little" and "a lot"
//! are fractions of the flow setpoint when one lines up with the row, or of the
//! observed flow distribution otherwise.

use serde::Serialize;

use super::stats::{max, median, percent};
use crate::align::AlignedRow;
use crate::config::{DamperConfig, FlowReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamperBasis {
    Setpoint,
    Median,
    Max,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DamperSanityMetrics {
    pub samples: usize,
    pub basis: Option<DamperBasis>,
    pub high_open_low_flow_pct: Option<f64>,
    pub closed_high_flow_pct: Option<f64>,
}

#[derive(Default)]
struct Tally {
    total: usize,
    high_open_low_flow: usize,
    closed_high_flow: usize,
}

impl Tally {
    fn record(&mut self, flow: f64, damper: f64, reference: f64, cfg: &DamperConfig) {
        self.total += 1;
        if reference <= 0.0 {
            return;
        }
        let low_flow = cfg.low_flow_fraction * reference;
        let high_flow = cfg.high_flow_fraction * reference;
        if damper >= cfg.high_open_pct && flow < low_flow {
            self.high_open_low_flow += 1;
        }
        if damper <= cfg.closed_pct && flow > high_flow {
            self.closed_high_flow += 1;
        }
    }

    fn finish(self, basis: DamperBasis) -> DamperSanityMetrics {
        DamperSanityMetrics {
            samples: self.total,
            basis: Some(basis),
            high_open_low_flow_pct: percent(self.high_open_low_flow, self.total),
            closed_high_flow_pct: percent(self.closed_high_flow, self.total),
        }
    }
}

fn finite_triples(rows: &[AlignedRow]) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
    rows.iter()
        .filter_map(|row| Some((row.value(0)?, row.value(1)?, row.value(2)?)))
        .filter(|(a, b, c)| a.is_finite() && b.is_finite() && c.is_finite())
}

/// `rows` carry `[flow, damper, flow_setpoint]`. A row with a non-positive
/// setpoint counts toward the total but is never flagged.
pub fn damper_vs_setpoint(rows: &[AlignedRow], cfg: &DamperConfig) -> DamperSanityMetrics {
    let mut tally = Tally::default();
    for (flow, damper, setpoint) in finite_triples(rows) {
        tally.record(flow, damper, setpoint, cfg);
    }
    if tally.total == 0 {
        return DamperSanityMetrics::default();
    }
    tally.finish(DamperBasis::Setpoint)
}

/// `rows` carry `[flow, damper]`. Thresholds come from the configured statistic
/// of the aligned flow; a non-positive statistic leaves the percentages absent.
pub fn damper_vs_distribution(rows: &[AlignedRow], cfg: &DamperConfig) -> DamperSanityMetrics {
    let pairs: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| Some((row.value(0)?, row.value(1)?)))
        .filter(|(flow, damper)| flow.is_finite() && damper.is_finite())
        .collect();
    if pairs.is_empty() {
        return DamperSanityMetrics::default();
    }

    let flows: Vec<f64> = pairs.iter().map(|(flow, _)| *flow).collect();
    let (basis, reference) = match cfg.reference {
        FlowReference::Median => (DamperBasis::Median, median(&flows)),
        FlowReference::Max => (DamperBasis::Max, max(&flows)),
    };
    let Some(reference) = reference.filter(|value| *value > 0.0) else {
        return DamperSanityMetrics {
            samples: pairs.len(),
            basis: Some(basis),
            ..DamperSanityMetrics::default()
        };
    };

    let mut tally = Tally::default();
    for (flow, damper) in pairs {
        tally.record(flow, damper, reference, cfg);
    }
    tally.finish(basis)
}

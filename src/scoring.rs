use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const REASON_COLD_ZONE: &str = "cold_zone";
pub const REASON_HOT_ZONE: &str = "hot_zone";
pub const REASON_POOR_FLOW_TRACKING: &str = "poor_flow_tracking";
pub const REASON_DAMPER_LEAK: &str = "damper_leak";
pub const REASON_DAMPER_STUCK: &str = "damper_stuck";
pub const REASON_BORDERLINE_COMFORT: &str = "borderline_comfort";
pub const REASON_SLIGHTLY_COLD_ZONE: &str = "slightly_cold_zone";
pub const REASON_SLIGHTLY_HOT_ZONE: &str = "slightly_hot_zone";
pub const REASON_BORDERLINE_FLOW_TRACKING: &str = "borderline_flow_tracking";
pub const REASON_POSSIBLE_DAMPER_LEAK: &str = "possible_damper_leak";
pub const REASON_POSSIBLE_DAMPER_STUCK: &str = "possible_damper_stuck";

const COMFORT_WEIGHT: f64 = 3.0;
const FLOW_WEIGHT: f64 = 2.0;
const PENALTY_WEIGHT: f64 = 1.0;

const COMFORT_CRITICAL_PCT: f64 = 50.0;
const COMFORT_WARNING_PCT: f64 = 80.0;
const COMFORT_CRITICAL_BIAS: f64 = 3.0;
const COMFORT_WARNING_BIAS: f64 = 2.0;
const FLOW_CRITICAL_PCT: f64 = 40.0;
const FLOW_WARNING_PCT: f64 = 70.0;
const DAMPER_CRITICAL_PCT: f64 = 30.0;
const DAMPER_WARNING_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Critical,
    Warning,
    Ok,
    NoData,
}

impl Status {
    /// Sort rank: most urgent first.
    pub fn tier(self) -> u8 {
        match self {
            Status::Critical => 0,
            Status::Warning => 1,
            Status::Ok => 2,
            Status::NoData => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Critical => "critical",
            Status::Warning => "warning",
            Status::Ok => "ok",
            Status::NoData => "no_data",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The metric values the zone score and status are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreInputs {
    pub comfort_samples: usize,
    pub comfort_within_band_pct: Option<f64>,
    pub comfort_mean_error: Option<f64>,
    pub flow_within_band_pct: Option<f64>,
    pub damper_high_open_low_flow_pct: Option<f64>,
    pub damper_closed_high_flow_pct: Option<f64>,
    pub reheat_waste_pct: Option<f64>,
}

fn clamp_pct(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Weighted mean of whichever terms are present, in [0, 100]. Absent when no
/// term has data.
pub fn overall_score(inputs: &ScoreInputs) -> Option<f64> {
    let good = |value: Option<f64>| value.filter(|v| v.is_finite()).map(clamp_pct);
    let bad = |value: Option<f64>| value.filter(|v| v.is_finite()).map(|v| clamp_pct(100.0 - v));

    let terms = [
        (good(inputs.comfort_within_band_pct), COMFORT_WEIGHT),
        (good(inputs.flow_within_band_pct), FLOW_WEIGHT),
        (bad(inputs.damper_high_open_low_flow_pct), PENALTY_WEIGHT),
        (bad(inputs.damper_closed_high_flow_pct), PENALTY_WEIGHT),
        (bad(inputs.reheat_waste_pct), PENALTY_WEIGHT),
    ];

    let mut weighted = 0.0;
    let mut weights = 0.0;
    for (value, weight) in terms {
        if let Some(value) = value {
            weighted += value * weight;
            weights += weight;
        }
    }
    if weights == 0.0 {
        return None;
    }
    Some(clamp_pct(weighted / weights))
}

fn critical_reasons(inputs: &ScoreInputs) -> BTreeSet<&'static str> {
    let mut reasons = BTreeSet::new();
    if let (Some(within), Some(bias)) = (inputs.comfort_within_band_pct, inputs.comfort_mean_error) {
        if within < COMFORT_CRITICAL_PCT {
            if bias <= -COMFORT_CRITICAL_BIAS {
                reasons.insert(REASON_COLD_ZONE);
            } else if bias >= COMFORT_CRITICAL_BIAS {
                reasons.insert(REASON_HOT_ZONE);
            }
        }
    }
    if inputs.flow_within_band_pct.is_some_and(|pct| pct < FLOW_CRITICAL_PCT) {
        reasons.insert(REASON_POOR_FLOW_TRACKING);
    }
    if inputs
        .damper_high_open_low_flow_pct
        .is_some_and(|pct| pct > DAMPER_CRITICAL_PCT)
    {
        reasons.insert(REASON_DAMPER_LEAK);
    }
    if inputs
        .damper_closed_high_flow_pct
        .is_some_and(|pct| pct > DAMPER_CRITICAL_PCT)
    {
        reasons.insert(REASON_DAMPER_STUCK);
    }
    reasons
}

fn warning_reasons(inputs: &ScoreInputs) -> BTreeSet<&'static str> {
    let mut reasons = BTreeSet::new();
    // No lower bound: under COMFORT_CRITICAL_PCT with |bias| below
    // COMFORT_CRITICAL_BIAS no critical rule fires, so it warns instead.
    if inputs
        .comfort_within_band_pct
        .is_some_and(|pct| pct < COMFORT_WARNING_PCT)
    {
        let bias = inputs.comfort_mean_error.unwrap_or(0.0);
        let reason = if bias <= -COMFORT_WARNING_BIAS {
            REASON_SLIGHTLY_COLD_ZONE
        } else if bias >= COMFORT_WARNING_BIAS {
            REASON_SLIGHTLY_HOT_ZONE
        } else {
            REASON_BORDERLINE_COMFORT
        };
        reasons.insert(reason);
    }
    if inputs
        .flow_within_band_pct
        .is_some_and(|pct| (FLOW_CRITICAL_PCT..FLOW_WARNING_PCT).contains(&pct))
    {
        reasons.insert(REASON_BORDERLINE_FLOW_TRACKING);
    }
    if inputs
        .damper_high_open_low_flow_pct
        .is_some_and(|pct| pct > DAMPER_WARNING_PCT && pct <= DAMPER_CRITICAL_PCT)
    {
        reasons.insert(REASON_POSSIBLE_DAMPER_LEAK);
    }
    if inputs
        .damper_closed_high_flow_pct
        .is_some_and(|pct| pct > DAMPER_WARNING_PCT && pct <= DAMPER_CRITICAL_PCT)
    {
        reasons.insert(REASON_POSSIBLE_DAMPER_STUCK);
    }
    reasons
}

/// First matching tier wins. Reasons are sorted and unique; `ok` and `no_data`
/// carry none.
pub fn classify(inputs: &ScoreInputs) -> (Status, Vec<String>) {
    if inputs.comfort_samples == 0
        && inputs.comfort_within_band_pct.is_none()
        && inputs.flow_within_band_pct.is_none()
    {
        return (Status::NoData, Vec::new());
    }

    let critical = critical_reasons(inputs);
    if !critical.is_empty() {
        return (Status::Critical, critical.into_iter().map(str::to_string).collect());
    }

    let warning = warning_reasons(inputs);
    if !warning.is_empty() {
        return (Status::Warning, warning.into_iter().map(str::to_string).collect());
    }
    (Status::Ok, Vec::new())
}

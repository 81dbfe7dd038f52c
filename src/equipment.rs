//! Rooftop-unit / air-handler health: fan and cooling cycling plus
//! discharge-air tracking.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::align::align_nearest;
use crate::config::DiagnosticsConfig;
use crate::error::EngineResult;
use crate::health::fetch_role;
use crate::metrics::{compute_binary_cycles, compute_discharge_tracking, CycleMetrics, DischargeMetrics};
use crate::roles::Role;
use crate::scoring::Status;
use crate::series::{Sample, SeriesSource};
use crate::time::TimeRange;
use crate::zone_pairs::ZonePair;

pub const REASON_FAN_SHORT_CYCLING: &str = "fan_short_cycling";
pub const REASON_POSSIBLE_FAN_SHORT_CYCLING: &str = "possible_fan_short_cycling";
pub const REASON_COOLING_SHORT_CYCLING: &str = "cooling_short_cycling";
pub const REASON_POSSIBLE_COOLING_SHORT_CYCLING: &str = "possible_cooling_short_cycling";
pub const REASON_DISCHARGE_AIR_NOT_MEETING_SP: &str = "discharge_air_not_meeting_sp";
pub const REASON_BORDERLINE_DISCHARGE_AIR_TRACKING: &str = "borderline_discharge_air_tracking";

const SHORT_CYCLE_CRITICAL: usize = 10;
const SHORT_CYCLE_WARNING: usize = 3;
const DISCHARGE_POOR_PCT: f64 = 50.0;
const DISCHARGE_BORDERLINE_PCT: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentHealthMetrics {
    pub station: String,
    pub zone_root: String,
    pub equipment: Option<String>,
    /// Series the fan and cooling figures were computed from.
    pub fan_series: Option<String>,
    pub cooling_series: Option<String>,
    pub fan: CycleMetrics,
    pub cooling: CycleMetrics,
    pub discharge: DischargeMetrics,
    pub status: Status,
    pub reasons: Vec<String>,
}

/// Fetches `preferred`, falling back to `fallback` when that comes back empty.
fn fetch_preferred(
    source: &dyn SeriesSource,
    station: &str,
    pair: &ZonePair,
    preferred: Role,
    fallback: Role,
    range: &TimeRange,
) -> EngineResult<(Option<String>, Vec<Sample>)> {
    let samples = fetch_role(source, station, pair, preferred, range)?;
    if !samples.is_empty() {
        return Ok((pair.series_id(preferred).map(str::to_string), samples));
    }
    let samples = fetch_role(source, station, pair, fallback, range)?;
    let series = (!samples.is_empty())
        .then(|| pair.series_id(fallback).map(str::to_string))
        .flatten();
    Ok((series, samples))
}

fn cycling_reasons(
    metrics: &CycleMetrics,
    critical: &'static str,
    warning: &'static str,
) -> (Option<&'static str>, Option<&'static str>) {
    match metrics.short_cycle_count {
        Some(count) if count >= SHORT_CYCLE_CRITICAL => (Some(critical), None),
        Some(count) if count >= SHORT_CYCLE_WARNING => (None, Some(warning)),
        _ => (None, None),
    }
}

fn classify(
    fan: &CycleMetrics,
    cooling: &CycleMetrics,
    discharge: &DischargeMetrics,
) -> (Status, Vec<String>) {
    let mut critical = BTreeSet::new();
    let mut warning = BTreeSet::new();

    for (metrics, crit, warn) in [
        (fan, REASON_FAN_SHORT_CYCLING, REASON_POSSIBLE_FAN_SHORT_CYCLING),
        (
            cooling,
            REASON_COOLING_SHORT_CYCLING,
            REASON_POSSIBLE_COOLING_SHORT_CYCLING,
        ),
    ] {
        let (c, w) = cycling_reasons(metrics, crit, warn);
        critical.extend(c);
        warning.extend(w);
    }

    match discharge.within_band_pct {
        Some(pct) if pct < DISCHARGE_POOR_PCT => {
            warning.insert(REASON_DISCHARGE_AIR_NOT_MEETING_SP);
        }
        Some(pct) if pct < DISCHARGE_BORDERLINE_PCT => {
            warning.insert(REASON_BORDERLINE_DISCHARGE_AIR_TRACKING);
        }
        _ => {}
    }

    let to_vec = |reasons: BTreeSet<&'static str>| -> Vec<String> {
        reasons.into_iter().map(str::to_string).collect()
    };
    if !critical.is_empty() {
        return (Status::Critical, to_vec(critical));
    }
    if !warning.is_empty() {
        return (Status::Warning, to_vec(warning));
    }
    if fan.samples > 0 || cooling.samples > 0 || discharge.samples > 0 {
        return (Status::Ok, Vec::new());
    }
    (Status::NoData, Vec::new())
}

pub fn compute_equipment_health(
    source: &dyn SeriesSource,
    station: &str,
    pair: &ZonePair,
    config: &DiagnosticsConfig,
    range: TimeRange,
) -> EngineResult<EquipmentHealthMetrics> {
    config.validate()?;

    let (fan_series, fan_samples) =
        fetch_preferred(source, station, pair, Role::FanStatus, Role::FanCmd, &range)?;
    let (cooling_series, cooling_samples) = fetch_preferred(
        source,
        station,
        pair,
        Role::CompressorCmd,
        Role::CoolingValve,
        &range,
    )?;
    let discharge_air = fetch_role(source, station, pair, Role::DischargeAir, &range)?;
    let discharge_sp = fetch_role(source, station, pair, Role::DischargeAirSp, &range)?;

    let fan = compute_binary_cycles(&fan_samples, &config.cycles);
    let cooling = compute_binary_cycles(&cooling_samples, &config.cycles);
    let discharge = compute_discharge_tracking(
        &align_nearest(
            &discharge_air,
            &discharge_sp,
            config.discharge.align_tolerance_seconds,
        ),
        config.discharge.band,
    );
    let (status, reasons) = classify(&fan, &cooling, &discharge);

    tracing::debug!(
        station,
        zone_root = %pair.zone_root,
        status = %status,
        "equipment health computed"
    );
    Ok(EquipmentHealthMetrics {
        station: station.to_string(),
        zone_root: pair.zone_root.clone(),
        equipment: pair.equipment.clone(),
        fan_series,
        cooling_series,
        fan,
        cooling,
        discharge,
        status,
        reasons,
    })
}

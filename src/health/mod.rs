//! Per-zone health and the station-wide batch built on top of it.

use serde::Serialize;
use std::cmp::Ordering;

use crate::align::{align_many, align_nearest};
use crate::config::DiagnosticsConfig;
use crate::error::{EngineError, EngineResult};
use crate::metrics::{
    compute_comfort, compute_flow_tracking, compute_reheat_waste, damper_vs_distribution,
    damper_vs_setpoint, ComfortMetrics, DamperSanityMetrics, FlowMetrics, ReheatMetrics,
};
use crate::roles::Role;
use crate::scoring::{classify, overall_score, ScoreInputs, Status};
use crate::series::{Sample, SeriesSource};
use crate::time::TimeRange;
use crate::zone_pairs::{find, normalize_zone_query, ZonePair, ZonePairIndex};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ZoneSeriesIds {
    pub space_temp: Option<String>,
    pub space_temp_sp: Option<String>,
    pub flow: Option<String>,
    pub flow_sp: Option<String>,
    pub damper: Option<String>,
    pub reheat: Option<String>,
    pub fan_cmd: Option<String>,
    pub fan_status: Option<String>,
    pub cooling_valve: Option<String>,
    pub heating_valve: Option<String>,
    pub compressor_cmd: Option<String>,
    pub compressor_status: Option<String>,
}

impl ZoneSeriesIds {
    fn from_pair(pair: &ZonePair) -> Self {
        let id = |role: Role| pair.series_id(role).map(str::to_string);
        Self {
            space_temp: id(Role::SpaceTemp),
            space_temp_sp: id(Role::SpaceTempSp),
            flow: id(Role::Flow),
            flow_sp: id(Role::FlowSp),
            damper: id(Role::Damper),
            reheat: id(Role::Reheat),
            fan_cmd: id(Role::FanCmd),
            fan_status: id(Role::FanStatus),
            cooling_valve: id(Role::CoolingValve),
            heating_valve: id(Role::HeatingValve),
            compressor_cmd: id(Role::CompressorCmd),
            compressor_status: id(Role::CompressorStatus),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneHealthMetrics {
    pub station: String,
    pub zone_root: String,
    pub equipment: Option<String>,
    pub floor: Option<String>,
    pub series: ZoneSeriesIds,
    pub range: TimeRange,
    pub comfort: ComfortMetrics,
    pub flow: FlowMetrics,
    pub damper: DamperSanityMetrics,
    pub reheat: ReheatMetrics,
    pub overall_score: Option<f64>,
    pub status: Status,
    pub reasons: Vec<String>,
}

impl ZoneHealthMetrics {
    fn score_inputs(&self) -> ScoreInputs {
        ScoreInputs {
            comfort_samples: self.comfort.samples,
            comfort_within_band_pct: self.comfort.within_band_pct,
            comfort_mean_error: self.comfort.mean_error,
            flow_within_band_pct: self.flow.within_band_pct,
            damper_high_open_low_flow_pct: self.damper.high_open_low_flow_pct,
            damper_closed_high_flow_pct: self.damper.closed_high_flow_pct,
            reheat_waste_pct: self.reheat.waste_pct,
        }
    }
}

/// Fetches the series in `role`'s slot, or nothing if the slot is empty.
pub(crate) fn fetch_role(
    source: &dyn SeriesSource,
    station: &str,
    pair: &ZonePair,
    role: Role,
    range: &TimeRange,
) -> EngineResult<Vec<Sample>> {
    match pair.series_id(role) {
        Some(series_id) => source.fetch(station, series_id, range),
        None => Ok(Vec::new()),
    }
}

/// Health of one zone over `range`. Missing roles and empty fetches degrade to
/// "no data" blocks; only configuration and source failures are errors.
pub fn compute_zone_health(
    source: &dyn SeriesSource,
    station: &str,
    zone_root: &str,
    pair: &ZonePair,
    config: &DiagnosticsConfig,
    range: TimeRange,
) -> EngineResult<ZoneHealthMetrics> {
    config.validate()?;
    zone_health_unchecked(source, station, zone_root, pair, config, range)
}

fn zone_health_unchecked(
    source: &dyn SeriesSource,
    station: &str,
    zone_root: &str,
    pair: &ZonePair,
    config: &DiagnosticsConfig,
    range: TimeRange,
) -> EngineResult<ZoneHealthMetrics> {
    let window = config.comfort.occupied_window()?;
    let tolerance = config.align_tolerance_seconds;

    let temp = fetch_role(source, station, pair, Role::SpaceTemp, &range)?;
    let temp_sp = fetch_role(source, station, pair, Role::SpaceTempSp, &range)?;
    let flow = fetch_role(source, station, pair, Role::Flow, &range)?;
    let flow_sp = fetch_role(source, station, pair, Role::FlowSp, &range)?;
    let damper = fetch_role(source, station, pair, Role::Damper, &range)?;
    let reheat = fetch_role(source, station, pair, Role::Reheat, &range)?;

    let comfort = compute_comfort(
        &align_nearest(&temp, &temp_sp, tolerance),
        &window,
        config.comfort.comfort_band,
    );

    let flow_metrics = if flow.is_empty() {
        FlowMetrics::default()
    } else if flow_sp.is_empty() {
        FlowMetrics::without_setpoint(flow.len())
    } else {
        compute_flow_tracking(&align_nearest(&flow, &flow_sp, tolerance), &config.flow)
    };

    let damper_metrics = if flow.is_empty() || damper.is_empty() {
        DamperSanityMetrics::default()
    } else {
        let with_setpoint = if flow_sp.is_empty() {
            Vec::new()
        } else {
            align_many(&[&flow, &damper, &flow_sp], tolerance)
        };
        if with_setpoint.is_empty() {
            damper_vs_distribution(&align_nearest(&flow, &damper, tolerance), &config.damper)
        } else {
            damper_vs_setpoint(&with_setpoint, &config.damper)
        }
    };

    let reheat_metrics = compute_reheat_waste(
        &align_many(&[&temp, &temp_sp, &reheat], tolerance),
        &window,
        &config.reheat,
    );

    let mut metrics = ZoneHealthMetrics {
        station: station.to_string(),
        zone_root: zone_root.to_string(),
        equipment: pair.equipment.clone(),
        floor: pair.floor.clone(),
        series: ZoneSeriesIds::from_pair(pair),
        range,
        comfort,
        flow: flow_metrics,
        damper: damper_metrics,
        reheat: reheat_metrics,
        overall_score: None,
        status: Status::NoData,
        reasons: Vec::new(),
    };
    let inputs = metrics.score_inputs();
    metrics.overall_score = overall_score(&inputs);
    let (status, reasons) = classify(&inputs);
    metrics.status = status;
    metrics.reasons = reasons;

    tracing::debug!(
        station,
        zone_root,
        status = %metrics.status,
        score = ?metrics.overall_score,
        "zone health computed"
    );
    Ok(metrics)
}

/// Urgent first, then lowest score; zones without a score go last in their tier.
pub fn health_order(a: &ZoneHealthMetrics, b: &ZoneHealthMetrics) -> Ordering {
    a.status
        .tier()
        .cmp(&b.status.tier())
        .then_with(|| match (a.overall_score, b.overall_score) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

fn worker_count(zones: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(zones).max(1)
}

/// Every zone of `station` in `index`, computed in parallel and stably sorted
/// with [`health_order`]. The first failing zone (in index order) aborts the batch.
pub fn compute_station_health(
    source: &dyn SeriesSource,
    index: &ZonePairIndex,
    station: &str,
    config: &DiagnosticsConfig,
    range: TimeRange,
) -> EngineResult<Vec<ZoneHealthMetrics>> {
    config.validate()?;
    let Some(zones) = index.get(station) else {
        return Ok(Vec::new());
    };
    let zones: Vec<(&String, &ZonePair)> = zones.iter().collect();
    if zones.is_empty() {
        return Ok(Vec::new());
    }

    let workers = worker_count(zones.len());
    let chunk_size = zones.len().div_ceil(workers);
    let compute_chunk = |chunk: &[(&String, &ZonePair)]| -> Vec<EngineResult<ZoneHealthMetrics>> {
        chunk
            .iter()
            .map(|(zone_root, pair)| {
                zone_health_unchecked(source, station, zone_root, pair, config, range)
            })
            .collect()
    };
    let compute_chunk = &compute_chunk;

    let results: Vec<EngineResult<ZoneHealthMetrics>> = std::thread::scope(|scope| {
        let mut pending = Vec::new();
        for (idx, chunk) in zones.chunks(chunk_size).enumerate() {
            let spawned = std::thread::Builder::new()
                .name(format!("zone-health-{idx}"))
                .spawn_scoped(scope, move || compute_chunk(chunk));
            match spawned {
                Ok(handle) => pending.push((chunk, Some(handle))),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to spawn zone worker; computing inline");
                    pending.push((chunk, None));
                }
            }
        }
        pending
            .into_iter()
            .flat_map(|(chunk, handle)| match handle {
                Some(handle) => handle.join().unwrap_or_else(|payload| {
                    tracing::error!(station, "zone worker panicked");
                    std::panic::resume_unwind(payload)
                }),
                None => compute_chunk(chunk),
            })
            .collect()
    });

    let mut out = results.into_iter().collect::<EngineResult<Vec<_>>>()?;
    out.sort_by(health_order);
    tracing::info!(station, zones = out.len(), "station health computed");
    Ok(out)
}

/// Resolves a typed zone label against the index before computing its health.
pub fn zone_health_by_label(
    source: &dyn SeriesSource,
    index: &ZonePairIndex,
    station: &str,
    zone_label: &str,
    config: &DiagnosticsConfig,
    range: TimeRange,
) -> EngineResult<ZoneHealthMetrics> {
    let zone_root = normalize_zone_query(zone_label);
    let pair = find(index, station, &zone_root).ok_or_else(|| EngineError::ZoneNotFound {
        station: station.to_string(),
        zone_root: zone_root.clone(),
    })?;
    compute_zone_health(source, station, &zone_root, pair, config, range)
}

#[cfg(test)]
mod tests;

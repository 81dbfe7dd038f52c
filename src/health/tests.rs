use super::*;
use crate::config::DiagnosticsConfig;
use crate::roles::RoleRuleEngine;
use crate::series::{MemoryStore, SeriesCatalogEntry};
use crate::zone_pairs::build_index;
use chrono::{DateTime, Duration, TimeZone, Utc};

const STATION: &str = "AmsShop";

fn day_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 24, 0, 0, 0)
        .single()
        .expect("valid utc")
}

fn day() -> TimeRange {
    TimeRange::new(day_start(), day_start() + Duration::hours(24)).expect("range")
}

/// One sample every five minutes across the day.
fn every_five_minutes(value: impl Fn(usize) -> f64) -> Vec<Sample> {
    (0..288)
        .map(|i| Sample::new(day_start() + Duration::minutes(i as i64 * 5), value(i)))
        .collect()
}

struct Fixture {
    store: MemoryStore,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
        }
    }

    fn series(&mut self, equipment: &str, label: &str, samples: Vec<Sample>) -> &mut Self {
        let series_id = format!("/{STATION}/{equipment}/{label}");
        let entry = SeriesCatalogEntry {
            station: STATION.to_string(),
            equipment_label: Some(equipment.to_string()),
            floor: Some("Level 1".to_string()),
            series_id: series_id.clone(),
            display_label: Some(label.to_string()),
            tags: Vec::new(),
        };
        self.store.upsert_meta(&entry);
        self.store.add_samples(STATION, &series_id, samples);
        self
    }

    fn index(&self) -> ZonePairIndex {
        build_index(&self.store.catalog(), &RoleRuleEngine::builtin())
    }
}

fn building() -> Fixture {
    let mut fx = Fixture::new();
    fx.series("VAV 1-01", "Space Temp", every_five_minutes(|_| 72.0))
        .series("VAV 1-01", "Space Temp Setpoint", every_five_minutes(|_| 72.0))
        .series("VAV 1-01", "Box Flow", every_five_minutes(|_| 500.0))
        .series("VAV 1-01", "Flow Setpoint", every_five_minutes(|_| 500.0))
        .series("VAV 1-01", "Damper Position", every_five_minutes(|_| 50.0))
        .series("VAV 1-01", "Reheat Valve", every_five_minutes(|_| 0.0));

    fx.series("VAV 1-02", "Space Temp", every_five_minutes(|_| 66.0))
        .series("VAV 1-02", "Space Temp Setpoint", every_five_minutes(|_| 72.0));

    fx.series("VAV 1-03", "Box Flow", every_five_minutes(|_| 350.0));

    fx.series("VAV 1-04", "Space Temp", every_five_minutes(|_| 72.0))
        .series("VAV 1-04", "Space Temp Setpoint", every_five_minutes(|_| 72.0))
        .series(
            "VAV 1-04",
            "Box Flow",
            every_five_minutes(|i| if i % 2 == 0 { 500.0 } else { 600.0 }),
        )
        .series("VAV 1-04", "Flow Setpoint", every_five_minutes(|_| 500.0));

    fx.series("VAV 1-05", "Space Temp", every_five_minutes(|_| 75.0))
        .series("VAV 1-05", "Space Temp Setpoint", every_five_minutes(|_| 72.0))
        .series("VAV 1-05", "Reheat Valve", every_five_minutes(|_| 50.0));
    fx
}

fn zone(fx: &Fixture, zone_root: &str) -> ZoneHealthMetrics {
    let index = fx.index();
    let pair = find(&index, STATION, zone_root).expect("zone pair");
    compute_zone_health(
        &fx.store,
        STATION,
        zone_root,
        pair,
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect("zone health")
}

#[test]
fn healthy_zone_scores_full_marks() {
    let fx = building();
    let metrics = zone(&fx, "vav-1-01");

    assert_eq!(metrics.equipment.as_deref(), Some("VAV 1-01"));
    assert_eq!(metrics.floor.as_deref(), Some("Level 1"));
    assert!(metrics.series.space_temp.is_some());
    assert!(metrics.series.reheat.is_some());

    // 07:00 through 18:00 inclusive at five-minute spacing.
    assert_eq!(metrics.comfort.samples, 133);
    assert_eq!(metrics.comfort.within_band_pct, Some(100.0));
    assert_eq!(metrics.flow.samples, 288);
    assert_eq!(metrics.flow.within_band_pct, Some(100.0));
    assert_eq!(metrics.damper.basis, Some(crate::metrics::DamperBasis::Setpoint));
    assert_eq!(metrics.damper.high_open_low_flow_pct, Some(0.0));
    assert_eq!(metrics.reheat.reheat_on_samples, 0);
    assert_eq!(metrics.reheat.waste_pct, None);

    assert_eq!(metrics.status, Status::Ok);
    assert!(metrics.reasons.is_empty());
    let score = metrics.overall_score.expect("score");
    assert!((score - 100.0).abs() < 1e-9);
}

#[test]
fn cold_zone_is_critical() {
    let fx = building();
    let metrics = zone(&fx, "vav-1-02");
    assert_eq!(metrics.comfort.within_band_pct, Some(0.0));
    assert_eq!(metrics.comfort.mean_error, Some(-6.0));
    assert_eq!(metrics.status, Status::Critical);
    assert_eq!(metrics.reasons, vec!["cold_zone".to_string()]);
    assert_eq!(metrics.flow, FlowMetrics::default());
}

#[test]
fn flow_without_setpoint_is_no_data() {
    let fx = building();
    let metrics = zone(&fx, "vav-1-03");
    assert_eq!(metrics.flow.samples, 288);
    assert_eq!(metrics.flow.within_band_pct, None);
    assert_eq!(metrics.status, Status::NoData);
    assert!(metrics.reasons.is_empty());
    assert_eq!(metrics.overall_score, None);
}

#[test]
fn half_tracking_flow_is_a_warning() {
    let fx = building();
    let metrics = zone(&fx, "vav-1-04");
    assert_eq!(metrics.flow.within_band_pct, Some(50.0));
    assert_eq!(metrics.status, Status::Warning);
    assert_eq!(metrics.reasons, vec!["borderline_flow_tracking".to_string()]);
    let score = metrics.overall_score.expect("score");
    assert!((score - 80.0).abs() < 1e-9);
}

#[test]
fn reheat_against_a_warm_zone_is_waste() {
    let fx = building();
    let metrics = zone(&fx, "vav-1-05");
    assert_eq!(metrics.reheat.samples, 133);
    assert_eq!(metrics.reheat.waste_pct, Some(100.0));
    assert_eq!(metrics.status, Status::Critical);
    assert_eq!(metrics.reasons, vec!["hot_zone".to_string()]);
    assert_eq!(metrics.overall_score, Some(0.0));
}

#[test]
fn station_batch_sorts_by_tier_then_score() {
    let fx = building();
    let index = fx.index();
    let results = compute_station_health(
        &fx.store,
        &index,
        STATION,
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect("station health");
    let order: Vec<&str> = results.iter().map(|m| m.zone_root.as_str()).collect();
    assert_eq!(
        order,
        vec!["vav-1-02", "vav-1-05", "vav-1-04", "vav-1-01", "vav-1-03"]
    );
}

#[test]
fn station_batch_is_deterministic() {
    let fx = building();
    let index = fx.index();
    let config = DiagnosticsConfig::default();
    let first = compute_station_health(&fx.store, &index, STATION, &config, day()).expect("first");
    let second = compute_station_health(&fx.store, &index, STATION, &config, day()).expect("second");
    assert_eq!(first, second);
}

#[test]
fn unknown_station_yields_an_empty_batch() {
    let fx = building();
    let results = compute_station_health(
        &fx.store,
        &fx.index(),
        "Elsewhere",
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect("station health");
    assert!(results.is_empty());
}

#[test]
fn missing_scores_sort_last_within_a_tier() {
    let fx = building();
    let scored = zone(&fx, "vav-1-04");
    let mut unscored = scored.clone();
    unscored.zone_root = "vav-9-99".to_string();
    unscored.overall_score = None;
    let mut lower = scored.clone();
    lower.zone_root = "vav-9-98".to_string();
    lower.overall_score = Some(10.0);

    let mut all = vec![unscored, scored, lower];
    all.sort_by(health_order);
    let order: Vec<&str> = all.iter().map(|m| m.zone_root.as_str()).collect();
    assert_eq!(order, vec!["vav-9-98", "vav-1-04", "vav-9-99"]);
}

#[test]
fn window_limits_the_samples_used() {
    let fx = building();
    let index = fx.index();
    let pair = find(&index, STATION, "vav-1-01").expect("pair");
    let morning = TimeRange::new(
        day_start() + Duration::hours(6),
        day_start() + Duration::hours(8),
    )
    .expect("range");
    let metrics = compute_zone_health(
        &fx.store,
        STATION,
        "vav-1-01",
        pair,
        &DiagnosticsConfig::default(),
        morning,
    )
    .expect("zone health");
    // 06:00..=08:00 has 25 samples, of which 07:00..=08:00 (13) are occupied.
    assert_eq!(metrics.flow.samples, 25);
    assert_eq!(metrics.comfort.samples, 13);
}

#[test]
fn lookup_by_label_resolves_or_reports_not_found() {
    let fx = building();
    let index = fx.index();
    let config = DiagnosticsConfig::default();
    let metrics = zone_health_by_label(&fx.store, &index, STATION, "VAV 1-02", &config, day())
        .expect("zone health");
    assert_eq!(metrics.zone_root, "vav-1-02");

    let err = zone_health_by_label(&fx.store, &index, STATION, "VAV 7-77", &config, day())
        .expect_err("unknown zone");
    assert_eq!(
        err,
        EngineError::ZoneNotFound {
            station: STATION.to_string(),
            zone_root: "vav-7-77".to_string(),
        }
    );
}

#[test]
fn invalid_config_fails_before_any_fetch() {
    let fx = building();
    let index = fx.index();
    let pair = find(&index, STATION, "vav-1-01").expect("pair");
    let mut config = DiagnosticsConfig::default();
    config.flow.pct_tolerance = -0.1;
    let err = compute_zone_health(&FailingSource, STATION, "vav-1-01", pair, &config, day())
        .expect_err("invalid config");
    assert!(matches!(
        err,
        EngineError::InvalidConfig {
            field: "flow.pct_tolerance",
            ..
        }
    ));
}

struct FailingSource;

impl SeriesSource for FailingSource {
    fn fetch(&self, station: &str, series_id: &str, _range: &TimeRange) -> EngineResult<Vec<Sample>> {
        Err(EngineError::source(station, series_id, "connection reset"))
    }
}

#[test]
fn source_failures_propagate() {
    let fx = building();
    let index = fx.index();
    let pair = find(&index, STATION, "vav-1-02").expect("pair");
    let err = compute_zone_health(
        &FailingSource,
        STATION,
        "vav-1-02",
        pair,
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect_err("source failure");
    assert!(matches!(err, EngineError::Source { .. }));

    let err = compute_station_health(
        &FailingSource,
        &index,
        STATION,
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect_err("batch failure");
    assert!(matches!(err, EngineError::Source { .. }));
}

struct PanickingSource;

impl SeriesSource for PanickingSource {
    fn fetch(&self, _station: &str, _series_id: &str, _range: &TimeRange) -> EngineResult<Vec<Sample>> {
        panic!("fetch exploded")
    }
}

#[test]
fn worker_panics_reach_the_caller() {
    let fx = building();
    let index = fx.index();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        compute_station_health(
            &PanickingSource,
            &index,
            STATION,
            &DiagnosticsConfig::default(),
            day(),
        )
    }));
    let payload = outcome.expect_err("panic propagates");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"fetch exploded"));
}

#[test]
fn zone_without_series_is_no_data() {
    let pair = ZonePair::new(STATION, "ahu-1");
    let metrics = compute_zone_health(
        &MemoryStore::new(),
        STATION,
        "ahu-1",
        &pair,
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect("zone health");
    assert_eq!(metrics.status, Status::NoData);
    assert_eq!(metrics.overall_score, None);
    assert!(metrics.reasons.is_empty());
}

#[test]
fn serializes_status_in_snake_case() {
    let pair = ZonePair::new(STATION, "ahu-1");
    let metrics = compute_zone_health(
        &MemoryStore::new(),
        STATION,
        "ahu-1",
        &pair,
        &DiagnosticsConfig::default(),
        day(),
    )
    .expect("zone health");
    let json = serde_json::to_value(&metrics).expect("json");
    assert_eq!(json["status"], "no_data");
    assert_eq!(json["reasons"], serde_json::json!([]));
    assert!(json["overall_score"].is_null());
}

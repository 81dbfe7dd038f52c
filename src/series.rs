use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::time::TimeRange;

pub const DEFAULT_MAX_SAMPLES_PER_SERIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(ts: DateTime<Utc>, value: f64) -> Self {
        Self { ts, value }
    }
}

/// A sample as handed over by the ingest side, before validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPoint {
    pub timestamp: String,
    pub value: JsonValue,
    #[serde(default)]
    pub status: Option<String>,
}

/// One known series, as listed by the store.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SeriesCatalogEntry {
    pub station: String,
    #[serde(default, alias = "equipmentLabel", alias = "equipment")]
    pub equipment_label: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(alias = "seriesId", alias = "history_id", alias = "historyId")]
    pub series_id: String,
    #[serde(default, alias = "displayLabel", alias = "point_name")]
    pub display_label: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Range reads by (station, series id). Implementations own all I/O.
pub trait SeriesSource: Send + Sync {
    /// Samples with `range.start <= ts <= range.end`, ascending. An unknown series
    /// yields an empty vector.
    fn fetch(&self, station: &str, series_id: &str, range: &TimeRange) -> EngineResult<Vec<Sample>>;
}

const NIAGARA_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%z"];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// RFC 3339, the Niagara history layout (`2025-11-24 00:00:01.349-0700`), or a
/// naive timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NIAGARA_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(trimmed, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

pub fn parse_value(raw: &JsonValue) -> Option<f64> {
    let value = match raw {
        JsonValue::Number(number) => number.as_f64()?,
        JsonValue::String(text) => text.trim().parse::<f64>().ok()?,
        JsonValue::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Validates, sorts and de-duplicates a batch. Malformed points are dropped one
/// by one; a duplicate timestamp keeps the later point.
pub fn normalize_points(points: &[RawPoint]) -> Vec<Sample> {
    let mut by_ts: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    let mut dropped = 0usize;
    for point in points {
        let Some(ts) = parse_timestamp(&point.timestamp) else {
            tracing::debug!(timestamp = %point.timestamp, "dropping sample with unparseable timestamp");
            dropped += 1;
            continue;
        };
        let Some(value) = parse_value(&point.value) else {
            tracing::debug!(timestamp = %point.timestamp, value = %point.value, "dropping sample with unusable value");
            dropped += 1;
            continue;
        };
        by_ts.insert(ts, value);
    }
    if dropped > 0 {
        tracing::warn!(dropped, kept = by_ts.len(), "dropped malformed samples from batch");
    }
    by_ts
        .into_iter()
        .map(|(ts, value)| Sample::new(ts, value))
        .collect()
}

#[derive(Debug, Default)]
struct StoreState {
    samples: HashMap<(String, String), BTreeMap<DateTime<Utc>, f64>>,
    meta: BTreeMap<(String, String), SeriesCatalogEntry>,
}

/// Process-local series store with a per-series sample cap.
#[derive(Debug)]
pub struct MemoryStore {
    max_per_series: usize,
    state: RwLock<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_field(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        *slot = Some(value.to_string());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SAMPLES_PER_SERIES)
    }

    pub fn with_capacity(max_per_series: usize) -> Self {
        Self {
            max_per_series: max_per_series.max(1),
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Records catalog metadata. Only non-empty incoming fields overwrite.
    pub fn upsert_meta(&self, entry: &SeriesCatalogEntry) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = (entry.station.clone(), entry.series_id.clone());
        let meta = state.meta.entry(key).or_insert_with(|| SeriesCatalogEntry {
            station: entry.station.clone(),
            series_id: entry.series_id.clone(),
            ..SeriesCatalogEntry::default()
        });
        merge_field(&mut meta.equipment_label, &entry.equipment_label);
        merge_field(&mut meta.floor, &entry.floor);
        merge_field(&mut meta.display_label, &entry.display_label);
        if !entry.tags.is_empty() {
            meta.tags = entry.tags.clone();
        }
    }

    pub fn add_samples<I>(&self, station: &str, series_id: &str, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = (station.to_string(), series_id.to_string());
        state
            .meta
            .entry(key.clone())
            .or_insert_with(|| SeriesCatalogEntry {
                station: station.to_string(),
                series_id: series_id.to_string(),
                ..SeriesCatalogEntry::default()
            });
        let series = state.samples.entry(key).or_default();
        for sample in samples {
            if sample.value.is_finite() {
                series.insert(sample.ts, sample.value);
            }
        }
        while series.len() > self.max_per_series {
            series.pop_first();
        }
    }

    /// Normalizes and stores a raw batch; returns how many samples were accepted.
    pub fn add_raw(&self, station: &str, series_id: &str, points: &[RawPoint]) -> usize {
        let samples = normalize_points(points);
        let accepted = samples.len();
        self.add_samples(station, series_id, samples);
        accepted
    }

    /// Newest sample timestamp across every series of `station`.
    pub fn latest_timestamp(&self, station: &str) -> Option<DateTime<Utc>> {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state
            .samples
            .iter()
            .filter(|((series_station, _), _)| series_station == station)
            .filter_map(|(_, series)| series.last_key_value().map(|(ts, _)| *ts))
            .max()
    }

    /// Every known series ordered by station, then series id.
    pub fn catalog(&self) -> Vec<SeriesCatalogEntry> {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.meta.values().cloned().collect()
    }
}

impl SeriesSource for MemoryStore {
    fn fetch(&self, station: &str, series_id: &str, range: &TimeRange) -> EngineResult<Vec<Sample>> {
        let state = self.state.read().map_err(|_| {
            EngineError::source(station, series_id, "memory store lock poisoned")
        })?;
        let Some(series) = state
            .samples
            .get(&(station.to_string(), series_id.to_string()))
        else {
            return Ok(Vec::new());
        };
        Ok(series
            .range(range.start..=range.end)
            .map(|(ts, value)| Sample::new(*ts, *value))
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotSeries {
    pub station: String,
    #[serde(alias = "seriesId", alias = "historyId")]
    pub series_id: String,
    #[serde(default)]
    pub points: Vec<RawPoint>,
}

/// A catalog plus raw series, as exported by the store for offline diagnosis.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Snapshot {
    #[serde(default)]
    pub catalog: Vec<SeriesCatalogEntry>,
    #[serde(default)]
    pub series: Vec<SnapshotSeries>,
}

impl Snapshot {
    pub fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new();
        for entry in &self.catalog {
            store.upsert_meta(entry);
        }
        for series in &self.series {
            let accepted = store.add_raw(&series.station, &series.series_id, &series.points);
            tracing::debug!(
                station = %series.station,
                series_id = %series.series_id,
                accepted,
                "loaded snapshot series"
            );
        }
        store
    }
}

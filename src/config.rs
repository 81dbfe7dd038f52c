use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::time::{parse_clock_time, parse_timezone, OccupiedWindow};

const DEFAULT_WINDOW_HOURS: i64 = 24;
const DEFAULT_ALIGN_TOLERANCE_SECONDS: i64 = 30;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComfortConfig {
    pub occupied_start: String,
    pub occupied_end: String,
    /// Allowed |temperature - setpoint| in degrees.
    pub comfort_band: f64,
    /// IANA zone whose wall clock decides occupancy.
    pub timezone: String,
}

impl Default for ComfortConfig {
    fn default() -> Self {
        Self {
            occupied_start: "07:00".to_string(),
            occupied_end: "18:00".to_string(),
            comfort_band: 2.0,
            timezone: "UTC".to_string(),
        }
    }
}

impl ComfortConfig {
    pub fn occupied_window(&self) -> EngineResult<OccupiedWindow> {
        let start = parse_clock_time("comfort.occupied_start", &self.occupied_start)?;
        let end = parse_clock_time("comfort.occupied_end", &self.occupied_end)?;
        let tz = parse_timezone(&self.timezone)?;
        Ok(OccupiedWindow::new(start, end, tz))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowTrackingConfig {
    /// Fraction of |setpoint|, e.g. 0.1 = +/-10%.
    pub pct_tolerance: f64,
    /// When set, the band is max(abs_tolerance, pct_tolerance * |setpoint|).
    pub abs_tolerance: Option<f64>,
}

impl Default for FlowTrackingConfig {
    fn default() -> Self {
        Self {
            pct_tolerance: 0.1,
            abs_tolerance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowReference {
    #[default]
    Median,
    Max,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DamperConfig {
    pub high_open_pct: f64,
    pub closed_pct: f64,
    pub low_flow_fraction: f64,
    pub high_flow_fraction: f64,
    /// Statistic of the observed flow used when no setpoint lines up.
    pub reference: FlowReference,
}

impl Default for DamperConfig {
    fn default() -> Self {
        Self {
            high_open_pct: 90.0,
            closed_pct: 10.0,
            low_flow_fraction: 0.3,
            high_flow_fraction: 0.7,
            reference: FlowReference::Median,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReheatConfig {
    pub on_threshold: f64,
    pub deadband: f64,
}

impl Default for ReheatConfig {
    fn default() -> Self {
        Self {
            on_threshold: 0.0,
            deadband: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CycleConfig {
    pub on_threshold: f64,
    pub min_cycle_minutes: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            on_threshold: 0.5,
            min_cycle_minutes: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DischargeConfig {
    pub band: f64,
    pub align_tolerance_seconds: i64,
}

impl Default for DischargeConfig {
    fn default() -> Self {
        Self {
            band: 2.0,
            align_tolerance_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub align_tolerance_seconds: i64,
    pub comfort: ComfortConfig,
    pub flow: FlowTrackingConfig,
    pub damper: DamperConfig,
    pub reheat: ReheatConfig,
    pub cycles: CycleConfig,
    pub discharge: DischargeConfig,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            align_tolerance_seconds: DEFAULT_ALIGN_TOLERANCE_SECONDS,
            comfort: ComfortConfig::default(),
            flow: FlowTrackingConfig::default(),
            damper: DamperConfig::default(),
            reheat: ReheatConfig::default(),
            cycles: CycleConfig::default(),
            discharge: DischargeConfig::default(),
        }
    }
}

fn require_non_negative(field: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::invalid_config(
            field,
            format!("must be a non-negative number, got {value}"),
        ));
    }
    Ok(())
}

fn require_percent(field: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(EngineError::invalid_config(
            field,
            format!("must be within [0, 100], got {value}"),
        ));
    }
    Ok(())
}

fn require_fraction(field: &'static str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(EngineError::invalid_config(
            field,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}

impl DiagnosticsConfig {
    /// Rejects out-of-range knobs instead of clamping them.
    pub fn validate(&self) -> EngineResult<()> {
        if self.align_tolerance_seconds < 0 {
            return Err(EngineError::invalid_config(
                "align_tolerance_seconds",
                format!("must be non-negative, got {}", self.align_tolerance_seconds),
            ));
        }

        self.comfort.occupied_window()?;
        require_non_negative("comfort.comfort_band", self.comfort.comfort_band)?;

        require_non_negative("flow.pct_tolerance", self.flow.pct_tolerance)?;
        if let Some(abs) = self.flow.abs_tolerance {
            require_non_negative("flow.abs_tolerance", abs)?;
        }

        require_percent("damper.high_open_pct", self.damper.high_open_pct)?;
        require_percent("damper.closed_pct", self.damper.closed_pct)?;
        if self.damper.closed_pct >= self.damper.high_open_pct {
            return Err(EngineError::invalid_config(
                "damper.closed_pct",
                "must be below damper.high_open_pct",
            ));
        }
        require_fraction("damper.low_flow_fraction", self.damper.low_flow_fraction)?;
        require_fraction("damper.high_flow_fraction", self.damper.high_flow_fraction)?;
        if self.damper.low_flow_fraction >= self.damper.high_flow_fraction {
            return Err(EngineError::invalid_config(
                "damper.low_flow_fraction",
                "must be below damper.high_flow_fraction",
            ));
        }

        require_non_negative("reheat.deadband", self.reheat.deadband)?;
        if !self.reheat.on_threshold.is_finite() {
            return Err(EngineError::invalid_config(
                "reheat.on_threshold",
                "must be finite",
            ));
        }

        if !self.cycles.on_threshold.is_finite() {
            return Err(EngineError::invalid_config(
                "cycles.on_threshold",
                "must be finite",
            ));
        }
        if !self.cycles.min_cycle_minutes.is_finite() || self.cycles.min_cycle_minutes <= 0.0 {
            return Err(EngineError::invalid_config(
                "cycles.min_cycle_minutes",
                format!("must be positive, got {}", self.cycles.min_cycle_minutes),
            ));
        }

        require_non_negative("discharge.band", self.discharge.band)?;
        if self.discharge.align_tolerance_seconds < 0 {
            return Err(EngineError::invalid_config(
                "discharge.align_tolerance_seconds",
                format!(
                    "must be non-negative, got {}",
                    self.discharge.align_tolerance_seconds
                ),
            ));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read diagnostics config {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse diagnostics config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid diagnostics config {}", path.display()))?;
        Ok(config)
    }
}

fn setup_config_path() -> Option<PathBuf> {
    env::var("ZONE_HEALTH_SETUP_CONFIG_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SetupConfigOverrides {
    #[serde(default)]
    role_rules_path: Option<String>,
    #[serde(default)]
    diagnostics_path: Option<String>,
    #[serde(default)]
    window_hours: Option<i64>,
}

fn load_setup_config_overrides() -> Option<SetupConfigOverrides> {
    let path = setup_config_path()?;
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse setup config; using env defaults"
            );
            None
        }
    }
}

fn apply_setup_overrides(config: &mut ServiceConfig, overrides: &SetupConfigOverrides) {
    if let Some(path) = overrides
        .role_rules_path
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        config.role_rules_path = Some(PathBuf::from(path));
    }
    if let Some(path) = overrides
        .diagnostics_path
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        config.diagnostics_path = Some(PathBuf::from(path));
    }
    if let Some(hours) = overrides.window_hours.filter(|v| *v > 0) {
        config.window_hours = hours;
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Settings for the command-line driver. The library itself only takes
/// [`DiagnosticsConfig`] values.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub role_rules_path: Option<PathBuf>,
    pub diagnostics_path: Option<PathBuf>,
    pub window_hours: i64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let window_hours = match env::var("ZONE_HEALTH_WINDOW_HOURS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("ZONE_HEALTH_WINDOW_HOURS is not an integer: {raw}"))?,
            _ => DEFAULT_WINDOW_HOURS,
        };

        let mut config = Self {
            role_rules_path: env_path("ZONE_HEALTH_ROLE_RULES_PATH"),
            diagnostics_path: env_path("ZONE_HEALTH_DIAGNOSTICS_PATH"),
            window_hours,
        };

        if let Some(overrides) = load_setup_config_overrides() {
            apply_setup_overrides(&mut config, &overrides);
        }

        if config.window_hours <= 0 {
            anyhow::bail!("window hours must be positive, got {}", config.window_hours);
        }
        Ok(config)
    }

    pub fn diagnostics(&self) -> Result<DiagnosticsConfig> {
        match &self.diagnostics_path {
            Some(path) => DiagnosticsConfig::from_json_file(path),
            None => Ok(DiagnosticsConfig::default()),
        }
    }
}

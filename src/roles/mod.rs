//! Semantic role inference for telemetry points.
//!
//! Rules are evaluated as a whole set; the matching rule with the lowest priority
//! number decides the role. Tag-driven rules carry small priorities so they always
//! outrank the label-pattern fallbacks.

mod rules;
mod source;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::naming::{canonical_key, FALLBACK_KEY};

pub use rules::RoleRule;
pub use source::{RuleSet, RuleSource, DEFAULT_RULES_JSON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SpaceTemp,
    SpaceTempSp,
    Flow,
    FlowSp,
    Damper,
    Reheat,
    FanCmd,
    FanStatus,
    CoolingValve,
    HeatingValve,
    CompressorCmd,
    CompressorStatus,
    DischargeAir,
    DischargeAirSp,
}

impl Role {
    pub const ALL: [Role; 14] = [
        Role::SpaceTemp,
        Role::SpaceTempSp,
        Role::Flow,
        Role::FlowSp,
        Role::Damper,
        Role::Reheat,
        Role::FanCmd,
        Role::FanStatus,
        Role::CoolingValve,
        Role::HeatingValve,
        Role::CompressorCmd,
        Role::CompressorStatus,
        Role::DischargeAir,
        Role::DischargeAirSp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SpaceTemp => "space_temp",
            Role::SpaceTempSp => "space_temp_sp",
            Role::Flow => "flow",
            Role::FlowSp => "flow_sp",
            Role::Damper => "damper",
            Role::Reheat => "reheat",
            Role::FanCmd => "fan_cmd",
            Role::FanStatus => "fan_status",
            Role::CoolingValve => "cooling_valve",
            Role::HeatingValve => "heating_valve",
            Role::CompressorCmd => "compressor_cmd",
            Role::CompressorStatus => "compressor_status",
            Role::DischargeAir => "discharge_air",
            Role::DischargeAirSp => "discharge_air_sp",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| format!("unknown role {s:?}"))
    }
}

/// Normalizes one tag. Namespaced marker tags (`m:zoneAirTempSensor`) keep only
/// their suffix. Returns `None` for tags with no usable characters.
pub fn tag_key(raw: &str) -> Option<String> {
    let suffix = raw.rsplit(':').next().unwrap_or(raw);
    let key = canonical_key(suffix);
    (key != FALLBACK_KEY || suffix.trim().eq_ignore_ascii_case(FALLBACK_KEY)).then_some(key)
}

pub fn tag_set<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| tag_key(tag.as_ref()))
        .collect()
}

/// Loads its rule set on first use and keeps it for the engine's lifetime.
#[derive(Debug)]
pub struct RoleRuleEngine {
    source: RuleSource,
    rules: OnceLock<RuleSet>,
}

impl RoleRuleEngine {
    pub fn new(source: RuleSource) -> Self {
        Self {
            source,
            rules: OnceLock::new(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(RuleSource::Builtin)
    }

    /// An engine over an already-loaded set; no lazy load happens.
    pub fn with_rules(rules: RuleSet) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(rules);
        Self {
            source: RuleSource::Builtin,
            rules: cell,
        }
    }

    /// Process-wide engine over the built-in rules.
    pub fn shared() -> &'static RoleRuleEngine {
        static SHARED: OnceLock<RoleRuleEngine> = OnceLock::new();
        SHARED.get_or_init(RoleRuleEngine::builtin)
    }

    pub fn source(&self) -> &RuleSource {
        &self.source
    }

    pub fn rules(&self) -> &RuleSet {
        self.rules.get_or_init(|| RuleSet::load(&self.source))
    }

    pub fn infer_role<S: AsRef<str>>(&self, label: &str, tags: &[S]) -> Option<Role> {
        let tags = tag_set(tags);
        self.rules().infer_role(label, &tags)
    }
}

impl Default for RoleRuleEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

//! Groups catalog series into one record per physical piece of equipment.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::naming::{canonical_key, decode};
use crate::roles::{Role, RoleRuleEngine};
use crate::series::SeriesCatalogEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesRef {
    pub series_id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ZonePair {
    pub station: String,
    pub zone_root: String,
    pub equipment: Option<String>,
    pub floor: Option<String>,
    pub space_temp: Option<SeriesRef>,
    pub space_temp_sp: Option<SeriesRef>,
    pub flow: Option<SeriesRef>,
    pub flow_sp: Option<SeriesRef>,
    pub damper: Option<SeriesRef>,
    pub reheat: Option<SeriesRef>,
    pub fan_cmd: Option<SeriesRef>,
    pub fan_status: Option<SeriesRef>,
    pub cooling_valve: Option<SeriesRef>,
    pub heating_valve: Option<SeriesRef>,
    pub compressor_cmd: Option<SeriesRef>,
    pub compressor_status: Option<SeriesRef>,
    pub discharge_air: Option<SeriesRef>,
    pub discharge_air_sp: Option<SeriesRef>,
}

impl ZonePair {
    pub fn new(station: impl Into<String>, zone_root: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            zone_root: zone_root.into(),
            ..Self::default()
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<SeriesRef> {
        match role {
            Role::SpaceTemp => &mut self.space_temp,
            Role::SpaceTempSp => &mut self.space_temp_sp,
            Role::Flow => &mut self.flow,
            Role::FlowSp => &mut self.flow_sp,
            Role::Damper => &mut self.damper,
            Role::Reheat => &mut self.reheat,
            Role::FanCmd => &mut self.fan_cmd,
            Role::FanStatus => &mut self.fan_status,
            Role::CoolingValve => &mut self.cooling_valve,
            Role::HeatingValve => &mut self.heating_valve,
            Role::CompressorCmd => &mut self.compressor_cmd,
            Role::CompressorStatus => &mut self.compressor_status,
            Role::DischargeAir => &mut self.discharge_air,
            Role::DischargeAirSp => &mut self.discharge_air_sp,
        }
    }

    pub fn slot(&self, role: Role) -> Option<&SeriesRef> {
        match role {
            Role::SpaceTemp => self.space_temp.as_ref(),
            Role::SpaceTempSp => self.space_temp_sp.as_ref(),
            Role::Flow => self.flow.as_ref(),
            Role::FlowSp => self.flow_sp.as_ref(),
            Role::Damper => self.damper.as_ref(),
            Role::Reheat => self.reheat.as_ref(),
            Role::FanCmd => self.fan_cmd.as_ref(),
            Role::FanStatus => self.fan_status.as_ref(),
            Role::CoolingValve => self.cooling_valve.as_ref(),
            Role::HeatingValve => self.heating_valve.as_ref(),
            Role::CompressorCmd => self.compressor_cmd.as_ref(),
            Role::CompressorStatus => self.compressor_status.as_ref(),
            Role::DischargeAir => self.discharge_air.as_ref(),
            Role::DischargeAirSp => self.discharge_air_sp.as_ref(),
        }
    }

    pub fn series_id(&self, role: Role) -> Option<&str> {
        self.slot(role).map(|slot| slot.series_id.as_str())
    }

    /// Fills the slot unless it already holds a series. Returns whether it wrote.
    pub fn assign(&mut self, role: Role, series: SeriesRef) -> bool {
        let slot = self.slot_mut(role);
        if slot.is_some() {
            return false;
        }
        *slot = Some(series);
        true
    }

    pub fn filled_roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.slot(*role).is_some())
            .collect()
    }
}

/// station -> zone_root -> pair.
pub type ZonePairIndex = BTreeMap<String, BTreeMap<String, ZonePair>>;

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Builds a fresh index from the catalog in the order given.
pub fn build_index(catalog: &[SeriesCatalogEntry], engine: &RoleRuleEngine) -> ZonePairIndex {
    let mut index = ZonePairIndex::new();
    let mut skipped = 0usize;

    for entry in catalog {
        let Some(station) = non_empty(Some(entry.station.as_str())) else {
            skipped += 1;
            continue;
        };
        let Some(equipment) = non_empty(entry.equipment_label.as_deref()) else {
            skipped += 1;
            continue;
        };
        let zone_root = canonical_key(equipment);

        let pair = index
            .entry(station.to_string())
            .or_default()
            .entry(zone_root.clone())
            .or_insert_with(|| ZonePair::new(station, zone_root.clone()));
        if pair.equipment.is_none() {
            pair.equipment = Some(decode(equipment));
        }
        if pair.floor.is_none() {
            pair.floor = non_empty(entry.floor.as_deref()).map(str::to_string);
        }

        let label = non_empty(entry.display_label.as_deref()).unwrap_or(entry.series_id.as_str());
        let Some(role) = engine.infer_role(label, &entry.tags) else {
            continue;
        };
        let assigned = pair.assign(
            role,
            SeriesRef {
                series_id: entry.series_id.clone(),
                label: decode(label),
            },
        );
        if !assigned {
            tracing::debug!(
                station,
                zone_root = %zone_root,
                role = %role,
                series_id = %entry.series_id,
                "role slot already filled; keeping first series"
            );
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "catalog entries without station or equipment");
    }
    index
}

pub fn find<'a>(index: &'a ZonePairIndex, station: &str, zone_root: &str) -> Option<&'a ZonePair> {
    index.get(station)?.get(zone_root)
}

/// Turns a typed zone label ("VAV 1-01") into the key `find` expects.
pub fn normalize_zone_query(label: &str) -> String {
    canonical_key(label)
}

//! Immutable static game data: buildings, zones and economic rules.
//!
//! Built once through [`RegistryBuilder`] before the engine starts, then
//! frozen into a [`Registry`] and shared read-only for the lifetime of the
//! game.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{BuildingId, ZoneId};
use crate::orbital::{OrbitalMechanics, ZoneDef};
use crate::rules::EconomicRules;

// ---------------------------------------------------------------------------
// Building definitions
// ---------------------------------------------------------------------------

/// Broad purpose of a building. Mining buildings cannot be placed in the
/// Dyson zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingCategory {
    Energy,
    Mining,
    Refining,
    Compute,
    Logistics,
    Production,
    Storage,
    #[default]
    Other,
}

fn one() -> f64 {
    1.0
}

/// Static description of a building type.
///
/// Rate multipliers are additive bonuses per built structure: a zone with
/// `n` structures carrying `mining_rate_multiplier = m` mines at
/// `1 + n·m` times the probe rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id: BuildingId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: BuildingCategory,
    /// Explicit mass. When absent the mass is `mass_multiplier` times the
    /// rules' base structure mass.
    #[serde(default)]
    pub mass_kg: Option<f64>,
    #[serde(default = "one")]
    pub mass_multiplier: f64,
    #[serde(default)]
    pub power_output_mw: f64,
    #[serde(default)]
    pub compute_eflops: f64,
    #[serde(default)]
    pub mining_rate_multiplier: f64,
    #[serde(default)]
    pub build_rate_multiplier: f64,
    #[serde(default)]
    pub energy_cost_multiplier: f64,
    #[serde(default)]
    pub max_per_zone: Option<u32>,
    /// Zones this building may be placed in. Empty means anywhere.
    #[serde(default)]
    pub allowed_orbital_zones: Vec<ZoneId>,
    /// Each additional copy in a zone costs this factor more than the last.
    #[serde(default = "one")]
    pub geometric_scaling_exponent: f64,
    /// Added to the zone's extraction efficiency factor per structure.
    #[serde(default)]
    pub extraction_bonus: f64,
    #[serde(default)]
    pub methalox_kg_per_day: f64,
    #[serde(default)]
    pub mass_driver_capacity_kg_per_day: f64,
    /// Energy one copy can hold, watt-days.
    #[serde(default)]
    pub energy_storage_wd: f64,
}

impl BuildingDef {
    pub fn new(id: &str, category: BuildingCategory) -> Self {
        Self {
            id: BuildingId::from(id),
            name: id.to_string(),
            category,
            mass_kg: None,
            mass_multiplier: 1.0,
            power_output_mw: 0.0,
            compute_eflops: 0.0,
            mining_rate_multiplier: 0.0,
            build_rate_multiplier: 0.0,
            energy_cost_multiplier: 0.0,
            max_per_zone: None,
            allowed_orbital_zones: Vec::new(),
            geometric_scaling_exponent: 1.0,
            extraction_bonus: 0.0,
            methalox_kg_per_day: 0.0,
            mass_driver_capacity_kg_per_day: 0.0,
            energy_storage_wd: 0.0,
        }
    }

    pub fn is_mining(&self) -> bool {
        self.category == BuildingCategory::Mining
    }

    pub fn allowed_in(&self, zone: &ZoneId) -> bool {
        self.allowed_orbital_zones.is_empty() || self.allowed_orbital_zones.contains(zone)
    }

    /// Mass of one copy.
    pub fn base_mass_kg(&self, rules: &EconomicRules) -> f64 {
        self.mass_kg
            .unwrap_or(self.mass_multiplier * rules.structures.base_mass_kg)
            .max(0.0)
    }

    /// Metal required for the next copy when `existing` are already built.
    pub fn cost_kg(&self, existing: u32, rules: &EconomicRules) -> f64 {
        let scale = self.geometric_scaling_exponent.max(0.0).powf(existing as f64);
        let cost = self.base_mass_kg(rules) * scale;
        if cost.is_finite() { cost } else { f64::MAX }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate building '{0}'")]
    DuplicateBuilding(BuildingId),
    #[error("duplicate zone '{0}'")]
    DuplicateZone(ZoneId),
    #[error("more than one Dyson zone: '{0}' and '{1}'")]
    MultipleDysonZones(ZoneId, ZoneId),
    #[error("zone '{zone}' has an invalid {field}")]
    InvalidZone { zone: ZoneId, field: &'static str },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    buildings: BTreeMap<BuildingId, BuildingDef>,
    orbital: OrbitalMechanics,
    rules: EconomicRules,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_building(&mut self, def: BuildingDef) -> Result<&mut Self, RegistryError> {
        if self.buildings.contains_key(&def.id) {
            return Err(RegistryError::DuplicateBuilding(def.id));
        }
        self.buildings.insert(def.id.clone(), def);
        Ok(self)
    }

    pub fn register_zone(&mut self, def: ZoneDef) -> Result<&mut Self, RegistryError> {
        if self.orbital.contains(&def.id) {
            return Err(RegistryError::DuplicateZone(def.id));
        }
        if !(def.radius_au.is_finite() && def.radius_au > 0.0) {
            return Err(RegistryError::InvalidZone {
                zone: def.id,
                field: "radius_au",
            });
        }
        if !(def.total_mass_kg.is_finite() && def.total_mass_kg >= 0.0) {
            return Err(RegistryError::InvalidZone {
                zone: def.id,
                field: "total_mass_kg",
            });
        }
        if !(0.0..=1.0).contains(&def.metal_percentage) {
            return Err(RegistryError::InvalidZone {
                zone: def.id,
                field: "metal_percentage",
            });
        }
        if def.is_dyson_zone {
            if let Some(existing) = self.orbital.dyson_zone() {
                return Err(RegistryError::MultipleDysonZones(existing.clone(), def.id));
            }
        }
        self.orbital.insert(def);
        Ok(self)
    }

    /// Replace all zones with an already-built table.
    pub fn orbital(&mut self, orbital: OrbitalMechanics) -> &mut Self {
        self.orbital = orbital;
        self
    }

    pub fn rules(&mut self, rules: EconomicRules) -> &mut Self {
        self.rules = rules;
        self
    }

    pub fn has_zones(&self) -> bool {
        self.orbital.zone_count() > 0
    }

    pub fn build(self) -> Registry {
        Registry {
            buildings: self.buildings,
            orbital: self.orbital,
            rules: self.rules,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Frozen static data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    buildings: BTreeMap<BuildingId, BuildingDef>,
    orbital: OrbitalMechanics,
    rules: EconomicRules,
}

impl Registry {
    pub fn building(&self, id: &BuildingId) -> Option<&BuildingDef> {
        self.buildings.get(id)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingDef> {
        self.buildings.values()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn orbital(&self) -> &OrbitalMechanics {
        &self.orbital
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&ZoneDef> {
        self.orbital.zone(id)
    }

    pub fn is_dyson_zone(&self, id: &ZoneId) -> bool {
        self.orbital.is_dyson_zone(id)
    }

    pub fn rules(&self) -> &EconomicRules {
        &self.rules
    }
}

//! The canonical mutable game state.
//!
//! # Overview
//!
//! [`GameState`] is owned by exactly one orchestrator and handed to each
//! system by `&mut` during a tick. Consumers outside the engine only ever see
//! it behind an `Arc`, so a snapshot can never be mutated or observe a
//! half-finished tick.
//!
//! # Mass accounting
//!
//! Per zone, `mass_remaining + stored_metal + probe_mass + structure_mass +
//! slag_mass + methalox` is unchanged by mining, refining, construction,
//! replication and recycling. It moves only with transfers and with Dyson
//! construction, which lifts metal out of the zone into the sphere. Probe
//! counts and `probe_mass` are therefore always changed together through
//! [`GameState::add_probes`] and [`GameState::remove_probes`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::id::{BuildingId, ConstructionKey, ProbeType, TransferId, ZoneId};
use crate::numeric::{finite_or_zero, non_negative};
use crate::orbital::ZoneDef;
use crate::production::UpgradeFactors;
use crate::registry::Registry;
use crate::research::ResearchProgress;
use crate::skills::{CompositeSkills, Skills};
use crate::transfer::Transfer;

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// Mutable resources of one orbital zone, all in kg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub mass_remaining: f64,
    pub stored_metal: f64,
    pub probe_mass: f64,
    pub structure_mass: f64,
    pub slag_mass: f64,
    pub methalox: f64,
    pub depleted: bool,
}

impl Zone {
    pub fn from_def(def: &ZoneDef) -> Self {
        Self {
            mass_remaining: if def.is_dyson_zone {
                0.0
            } else {
                non_negative(def.total_mass_kg)
            },
            ..Self::default()
        }
    }

    /// Sum of every mass pool in the zone.
    pub fn total_mass(&self) -> f64 {
        self.mass_remaining
            + self.stored_metal
            + self.probe_mass
            + self.structure_mass
            + self.slag_mass
            + self.methalox
    }

    /// Metal still in the ground. Derived, never stored.
    pub fn metal_remaining(&self, metal_percentage: f64) -> f64 {
        self.mass_remaining * metal_percentage
    }

    /// Strip NaN/infinity and negatives from every pool.
    pub fn sanitize(&mut self) {
        self.mass_remaining = non_negative(self.mass_remaining);
        self.stored_metal = non_negative(self.stored_metal);
        self.probe_mass = non_negative(self.probe_mass);
        self.structure_mass = non_negative(self.structure_mass);
        self.slag_mass = non_negative(self.slag_mass);
        self.methalox = non_negative(self.methalox);
    }
}

// ---------------------------------------------------------------------------
// Probe allocations
// ---------------------------------------------------------------------------

/// Fraction of a zone's probes assigned to each activity. Each value is in
/// `[0, 1]`; they need not sum to 1, and any remainder sits idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeAllocations {
    pub harvest: f64,
    pub construct: f64,
    pub replicate: f64,
    pub recycle: f64,
    pub recycle_probes: f64,
    pub dyson: f64,
}

impl ProbeAllocations {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.values().iter().all(|&v| v == 0.0)
    }

    pub fn values(&self) -> [f64; 6] {
        [
            self.harvest,
            self.construct,
            self.replicate,
            self.recycle,
            self.recycle_probes,
            self.dyson,
        ]
    }

    pub fn is_valid(&self) -> bool {
        self.values()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}

// ---------------------------------------------------------------------------
// Energy and Dyson
// ---------------------------------------------------------------------------

/// Global power balance for the current tick, in watts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyBalance {
    pub production_w: f64,
    pub consumption_w: f64,
    pub net_w: f64,
    /// `min(1, production / consumption)`, or 1 with no consumption.
    pub throttle: f64,
}

impl Default for EnergyBalance {
    fn default() -> Self {
        Self {
            production_w: 0.0,
            consumption_w: 0.0,
            net_w: 0.0,
            throttle: 1.0,
        }
    }
}

/// Energy banked in storage structures, watt-days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyStorage {
    pub stored_wd: f64,
    /// Recomputed every tick from storage structures and skill.
    pub capacity_wd: f64,
}

impl EnergyStorage {
    /// Fill level in `[0, 1]`; 0 with no capacity.
    pub fn fill(&self) -> f64 {
        if self.capacity_wd > 0.0 {
            (self.stored_wd / self.capacity_wd).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DysonState {
    pub mass_kg: f64,
    pub target_mass_kg: f64,
    /// Fraction of Dyson output routed to compute, in `[0, 1]`.
    pub compute_allocation: f64,
    pub economy_power_w: f64,
    pub compute_power_w: f64,
}

impl DysonState {
    pub fn completion(&self) -> f64 {
        if self.target_mass_kg > 0.0 {
            (self.mass_kg / self.target_mass_kg).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Rates and derived economics
// ---------------------------------------------------------------------------

/// Actual flows of the last tick, per day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRates {
    pub mining_kg_per_day: f64,
    pub metal_kg_per_day: f64,
    pub slag_kg_per_day: f64,
    pub probes_per_day: f64,
    pub construction_kg_per_day: f64,
    pub dyson_kg_per_day: f64,
    pub recycled_metal_kg_per_day: f64,
    pub probes_recycled_per_day: f64,
    pub methalox_kg_per_day: f64,
}

impl FlowRates {
    pub fn accumulate(&mut self, other: &FlowRates) {
        self.mining_kg_per_day += other.mining_kg_per_day;
        self.metal_kg_per_day += other.metal_kg_per_day;
        self.slag_kg_per_day += other.slag_kg_per_day;
        self.probes_per_day += other.probes_per_day;
        self.construction_kg_per_day += other.construction_kg_per_day;
        self.dyson_kg_per_day += other.dyson_kg_per_day;
        self.recycled_metal_kg_per_day += other.recycled_metal_kg_per_day;
        self.probes_recycled_per_day += other.probes_recycled_per_day;
        self.methalox_kg_per_day += other.methalox_kg_per_day;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub zones: BTreeMap<ZoneId, FlowRates>,
    pub total: FlowRates,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneEconomics {
    pub metal_remaining_kg: f64,
    pub probe_count: f64,
    /// `probe_mass / total zone mass`.
    pub probe_mass_ratio: f64,
    pub structure_count: u32,
    /// Fraction of the zone's original mass already mined.
    pub depletion_fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedEconomics {
    pub zones: BTreeMap<ZoneId, ZoneEconomics>,
    pub total_probes: f64,
    pub total_stored_metal: f64,
    pub total_structures: u32,
    pub probes_in_flight: f64,
    pub metal_in_flight: f64,
    pub dyson_completion: f64,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameState {
    pub time_days: f64,
    pub tick: u64,
    pub zones: BTreeMap<ZoneId, Zone>,
    pub probes_by_zone: BTreeMap<ZoneId, BTreeMap<ProbeType, f64>>,
    pub probe_allocations: BTreeMap<ZoneId, ProbeAllocations>,
    pub structures_by_zone: BTreeMap<ZoneId, BTreeMap<BuildingId, u32>>,
    pub enabled_construction: BTreeSet<ConstructionKey>,
    /// Metal invested in the next copy of each construction slot.
    pub construction_progress: BTreeMap<ConstructionKey, f64>,
    /// Optional stop count per slot.
    pub construction_targets: BTreeMap<ConstructionKey, u32>,
    /// Minimum probe-mass fraction of zone mass kept by self-recycling.
    pub probe_recycle_targets: BTreeMap<ZoneId, f64>,
    pub skills: Skills,
    pub composite_skills: CompositeSkills,
    pub upgrade_factors: UpgradeFactors,
    pub research: ResearchProgress,
    pub energy: EnergyBalance,
    pub energy_storage: EnergyStorage,
    pub dyson: DysonState,
    /// Intelligence produced last tick, FLOPS. Consumed by the next tick's
    /// research step.
    pub intelligence_flops: f64,
    pub transfers: SlotMap<TransferId, Transfer>,
    pub rates: Rates,
    pub derived: DerivedEconomics,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn zone_mut(&mut self, id: &ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id)
    }

    /// Get a zone, creating it from its static definition on first
    /// reference. Returns `None` for zones unknown to the registry.
    pub fn ensure_zone(&mut self, id: &ZoneId, registry: &Registry) -> Option<&mut Zone> {
        if !self.zones.contains_key(id) {
            let def = registry.zone(id)?;
            self.zones.insert(id.clone(), Zone::from_def(def));
        }
        self.zones.get_mut(id)
    }

    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.zones.keys().cloned().collect()
    }

    // -- Probes --

    pub fn probe_count(&self, zone: &ZoneId) -> f64 {
        self.probes_by_zone
            .get(zone)
            .map(|types| types.values().sum())
            .unwrap_or(0.0)
    }

    pub fn total_probes(&self) -> f64 {
        self.probes_by_zone
            .values()
            .flat_map(|types| types.values())
            .sum()
    }

    /// Add probes of the default type and their mass.
    pub fn add_probes(&mut self, zone: &ZoneId, count: f64, probe_mass_kg: f64) {
        let count = non_negative(count);
        if count == 0.0 {
            return;
        }
        let entry = self
            .probes_by_zone
            .entry(zone.clone())
            .or_default()
            .entry(ProbeType::default_type())
            .or_insert(0.0);
        *entry = finite_or_zero(*entry + count);
        if let Some(z) = self.zones.get_mut(zone) {
            z.probe_mass = non_negative(z.probe_mass + count * probe_mass_kg);
        }
    }

    /// Remove up to `count` probes, spread proportionally over probe types.
    /// Returns the number actually removed.
    pub fn remove_probes(&mut self, zone: &ZoneId, count: f64, probe_mass_kg: f64) -> f64 {
        let available = self.probe_count(zone);
        let removed = non_negative(count).min(available);
        if removed == 0.0 {
            return 0.0;
        }
        if let Some(types) = self.probes_by_zone.get_mut(zone) {
            let keep = 1.0 - removed / available;
            for v in types.values_mut() {
                *v = non_negative(*v * keep);
            }
        }
        if let Some(z) = self.zones.get_mut(zone) {
            z.probe_mass = non_negative(z.probe_mass - removed * probe_mass_kg);
        }
        removed
    }

    pub fn allocations(&self, zone: &ZoneId) -> ProbeAllocations {
        self.probe_allocations.get(zone).copied().unwrap_or_default()
    }

    // -- Structures --

    pub fn structure_count(&self, zone: &ZoneId, building: &BuildingId) -> u32 {
        self.structures_by_zone
            .get(zone)
            .and_then(|b| b.get(building))
            .copied()
            .unwrap_or(0)
    }

    /// Every `(building, count)` in a zone.
    pub fn structures_in(&self, zone: &ZoneId) -> impl Iterator<Item = (&BuildingId, u32)> {
        self.structures_by_zone
            .get(zone)
            .into_iter()
            .flat_map(|b| b.iter().map(|(id, &n)| (id, n)))
    }

    pub fn add_structure(&mut self, zone: &ZoneId, building: &BuildingId) -> u32 {
        let count = self
            .structures_by_zone
            .entry(zone.clone())
            .or_default()
            .entry(building.clone())
            .or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Enabled construction slots that belong to `zone`.
    pub fn enabled_in_zone<'a>(&'a self, zone: &'a ZoneId) -> impl Iterator<Item = &'a ConstructionKey> + 'a {
        self.enabled_construction
            .iter()
            .filter(move |key| &key.zone == zone)
    }

    pub fn probe_recycle_target(&self, zone: &ZoneId) -> f64 {
        self.probe_recycle_targets.get(zone).copied().unwrap_or(0.0)
    }
}

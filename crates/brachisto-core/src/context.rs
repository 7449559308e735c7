//! Explicit per-tick context handed to every system.
//!
//! # Overview
//!
//! A [`TickContext`] is built once per tick after skills, upgrade factors and
//! the energy balance are known. It carries everything a system reads but
//! does not own: the static registry, the tick's delta time, the skill
//! snapshot, the global energy throttle and the zone rates derived from them.
//! Systems write their results into the mutable [`GameState`] and record
//! flows and events in the context's [`TickLedger`].
//!
//! # Metal budget
//!
//! Construction, replication and Dyson building all draw on a zone's
//! `stored_metal` in the same tick. [`TickContext::plan_builds`] runs after
//! mining and computes one metal throttle per zone so the three consumers
//! together can never overdraw it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::EconomyEvent;
use crate::id::ZoneId;
use crate::numeric::non_negative;
use crate::production::{ProductionCalculator, UpgradeFactors, ZoneRates};
use crate::registry::Registry;
use crate::rules::EconomicRules;
use crate::skills::{CompositeSkills, Skills};
use crate::state::{FlowRates, GameState};

// ---------------------------------------------------------------------------
// TickSystem
// ---------------------------------------------------------------------------

/// A stage of the tick pipeline that mutates the game state.
pub trait TickSystem: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>);
}

// ---------------------------------------------------------------------------
// Build plan
// ---------------------------------------------------------------------------

/// Metal a zone's builders would use this tick, in kg, already scaled by the
/// energy throttle and delta time and capped at what they could still build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBuildPlan {
    pub construct_kg: f64,
    pub replicate_kg: f64,
    pub dyson_kg: f64,
    /// Scale in `[0, 1]` shared by all three consumers.
    pub metal_throttle: f64,
}

impl Default for ZoneBuildPlan {
    fn default() -> Self {
        Self {
            construct_kg: 0.0,
            replicate_kg: 0.0,
            dyson_kg: 0.0,
            metal_throttle: 1.0,
        }
    }
}

impl ZoneBuildPlan {
    pub fn demand_kg(&self) -> f64 {
        self.construct_kg + self.replicate_kg + self.dyson_kg
    }
}

// ---------------------------------------------------------------------------
// TickLedger
// ---------------------------------------------------------------------------

/// Amounts moved in one zone during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowTotals {
    pub mined_kg: f64,
    pub metal_kg: f64,
    pub slag_kg: f64,
    pub probes_built: f64,
    pub construction_kg: f64,
    pub dyson_kg: f64,
    pub recycled_metal_kg: f64,
    pub probes_recycled: f64,
    pub methalox_kg: f64,
}

impl FlowTotals {
    /// Convert tick totals into per-day rates.
    pub fn per_day(&self, delta_days: f64) -> FlowRates {
        if delta_days <= 0.0 {
            return FlowRates::default();
        }
        FlowRates {
            mining_kg_per_day: self.mined_kg / delta_days,
            metal_kg_per_day: self.metal_kg / delta_days,
            slag_kg_per_day: self.slag_kg / delta_days,
            probes_per_day: self.probes_built / delta_days,
            construction_kg_per_day: self.construction_kg / delta_days,
            dyson_kg_per_day: self.dyson_kg / delta_days,
            recycled_metal_kg_per_day: self.recycled_metal_kg / delta_days,
            probes_recycled_per_day: self.probes_recycled / delta_days,
            methalox_kg_per_day: self.methalox_kg / delta_days,
        }
    }
}

/// Everything the systems produced during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickLedger {
    pub zones: BTreeMap<ZoneId, FlowTotals>,
    pub events: Vec<EconomyEvent>,
}

impl TickLedger {
    pub fn zone(&mut self, zone: &ZoneId) -> &mut FlowTotals {
        self.zones.entry(zone.clone()).or_default()
    }

    pub fn flows(&self, zone: &ZoneId) -> FlowTotals {
        self.zones.get(zone).copied().unwrap_or_default()
    }

    pub fn emit(&mut self, event: EconomyEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<EconomyEvent> {
        std::mem::take(&mut self.events)
    }
}

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

pub struct TickContext<'a> {
    pub registry: &'a Registry,
    pub tick: u64,
    pub delta_days: f64,
    pub skills: Skills,
    pub composite: CompositeSkills,
    pub factors: UpgradeFactors,
    pub energy_throttle: f64,
    /// Potential per-day rates, computed once when the context is built.
    pub zone_rates: BTreeMap<ZoneId, ZoneRates>,
    /// Filled by [`TickContext::plan_builds`] after mining.
    pub build_plans: BTreeMap<ZoneId, ZoneBuildPlan>,
    pub ledger: TickLedger,
}

impl<'a> TickContext<'a> {
    /// Build the context from the skills and factors already stored in
    /// `state` for this tick.
    pub fn new(
        registry: &'a Registry,
        state: &GameState,
        delta_days: f64,
        energy_throttle: f64,
    ) -> Self {
        let skills = state.skills;
        let composite = state.composite_skills;
        let factors = state.upgrade_factors;
        let zone_rates = ProductionCalculator::all_zone_rates(state, registry, &factors, &composite);
        Self {
            registry,
            tick: state.tick,
            delta_days: non_negative(delta_days),
            skills,
            composite,
            factors,
            energy_throttle: energy_throttle.clamp(0.0, 1.0),
            zone_rates,
            build_plans: BTreeMap::new(),
            ledger: TickLedger::default(),
        }
    }

    pub fn rules(&self) -> &'a EconomicRules {
        self.registry.rules()
    }

    pub fn zone_rates(&self, zone: &ZoneId) -> ZoneRates {
        self.zone_rates.get(zone).copied().unwrap_or_default()
    }

    pub fn plan(&self, zone: &ZoneId) -> ZoneBuildPlan {
        self.build_plans.get(zone).copied().unwrap_or_default()
    }

    /// Compute each zone's build demand and the metal throttle that keeps
    /// the combined draw within `stored_metal`.
    pub fn plan_builds(&mut self, state: &GameState) {
        let scale = self.energy_throttle * self.delta_days;
        let rules = self.rules();
        let mut plans = BTreeMap::new();
        for (zone_id, zone) in &state.zones {
            let rates = self.zone_rates(zone_id);

            let remaining_cost: f64 = state
                .enabled_in_zone(zone_id)
                .filter_map(|key| {
                    let def = self.registry.building(&key.building)?;
                    let cost = def.cost_kg(state.structure_count(zone_id, &key.building), rules);
                    let invested = state.construction_progress.get(key).copied().unwrap_or(0.0);
                    Some(non_negative(cost - invested))
                })
                .sum();
            let construct_kg = (rates.construct_kg_per_day * scale).min(remaining_cost);

            let replicate_kg = rates.replicate_kg_per_day * scale;

            let dyson_remaining = non_negative(state.dyson.target_mass_kg - state.dyson.mass_kg);
            let dyson_kg = (rates.dyson_kg_per_day * scale).min(dyson_remaining);

            let mut plan = ZoneBuildPlan {
                construct_kg: non_negative(construct_kg),
                replicate_kg: non_negative(replicate_kg),
                dyson_kg: non_negative(dyson_kg),
                metal_throttle: 1.0,
            };
            plan.metal_throttle =
                ProductionCalculator::calculate_zone_metal_throttle(zone.stored_metal, plan.demand_kg());
            plans.insert(zone_id.clone(), plan);
        }
        self.build_plans = plans;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ConstructionKey;
    use crate::test_utils::*;

    // Test 1: Plenty of metal leaves the throttle at 1
    #[test]
    fn ample_metal_is_unthrottled() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, replicate_only());
        state.zone_mut(&earth()).unwrap().stored_metal = 1e5;
        let mut ctx = TickContext::new(&registry, &state, 1.0, 1.0);
        ctx.plan_builds(&state);
        let plan = ctx.plan(&earth());
        assert_eq!(plan.replicate_kg, 200.0);
        assert_eq!(plan.metal_throttle, 1.0);
    }

    // Test 2: Short metal scales the throttle down
    #[test]
    fn scarce_metal_throttles() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, replicate_only());
        state.zone_mut(&earth()).unwrap().stored_metal = 50.0;
        let mut ctx = TickContext::new(&registry, &state, 1.0, 1.0);
        ctx.plan_builds(&state);
        assert_eq!(ctx.plan(&earth()).metal_throttle, 0.25);
    }

    // Test 3: Construction demand is capped at the remaining cost
    #[test]
    fn construction_demand_capped_by_cost() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 1_000.0, construct_only());
        state
            .enabled_construction
            .insert(ConstructionKey::new(earth(), building("power_station")));
        let mut ctx = TickContext::new(&registry, &state, 1.0, 1.0);
        ctx.plan_builds(&state);
        assert_eq!(ctx.plan(&earth()).construct_kg, 1_000.0);
    }

    // Test 4: No enabled slots means no construction demand
    #[test]
    fn construction_without_slots_has_no_demand() {
        let registry = test_registry();
        let state = state_with_probes(&registry, &earth(), 10.0, construct_only());
        let mut ctx = TickContext::new(&registry, &state, 1.0, 1.0);
        ctx.plan_builds(&state);
        assert_eq!(ctx.plan(&earth()).construct_kg, 0.0);
    }

    // Test 5: Totals convert to per-day rates
    #[test]
    fn totals_convert_to_rates() {
        let totals = FlowTotals {
            mined_kg: 50.0,
            ..FlowTotals::default()
        };
        assert_eq!(totals.per_day(0.5).mining_kg_per_day, 100.0);
        assert_eq!(totals.per_day(0.0), FlowRates::default());
    }
}

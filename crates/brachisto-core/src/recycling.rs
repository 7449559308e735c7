//! Slag reprocessing, probe self-recycling and structure dismantling.
//!
//! All three keep mass inside the zone: whatever is not recovered as metal
//! goes back to slag.

use crate::context::{TickContext, TickSystem};
use crate::id::{BuildingId, ZoneId};
use crate::numeric::{clamp01, non_negative, safe_div};
use crate::registry::Registry;
use crate::rules::EconomicRules;
use crate::skills::Skills;
use crate::state::GameState;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecyclingError {
    #[error("unknown building '{0}'")]
    UnknownBuilding(BuildingId),
    #[error("no '{building}' in zone '{zone}' to recycle")]
    NothingToRecycle { zone: ZoneId, building: BuildingId },
}

/// Metal and slag produced by dismantling something.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Salvage {
    pub metal_kg: f64,
    pub slag_kg: f64,
}

#[derive(Debug, Default)]
pub struct RecyclingSystem;

impl RecyclingSystem {
    pub fn new() -> Self {
        Self
    }

    /// Fraction of recycled mass recovered as metal.
    pub fn efficiency(rules: &EconomicRules, skills: &Skills) -> f64 {
        let skill = non_negative(rules.skill_coefficients.recycling_efficiency.factor(skills));
        clamp01((rules.recycling.base_efficiency * skill).min(rules.recycling.max_efficiency))
    }

    /// Throttle in `[0, 1]` for probe self-recycling: 0 at or below the
    /// target probe-mass ratio, rising linearly to 1 one band above it.
    pub fn probe_recycle_ramp(ratio: f64, target: f64, band: f64) -> f64 {
        if band <= 0.0 {
            return if ratio > target { 1.0 } else { 0.0 };
        }
        clamp01((ratio - target) / band)
    }

    /// Dismantle one structure, returning its mass to the zone as metal and
    /// slag.
    pub fn recycle_structure(
        state: &mut GameState,
        registry: &Registry,
        zone_id: &ZoneId,
        building: &BuildingId,
    ) -> Result<Salvage, RecyclingError> {
        let def = registry
            .building(building)
            .ok_or_else(|| RecyclingError::UnknownBuilding(building.clone()))?;
        let count = state.structure_count(zone_id, building);
        if count == 0 {
            return Err(RecyclingError::NothingToRecycle {
                zone: zone_id.clone(),
                building: building.clone(),
            });
        }
        let efficiency = Self::efficiency(registry.rules(), &state.skills);
        let cost = def.cost_kg(count - 1, registry.rules());

        if let Some(counts) = state.structures_by_zone.get_mut(zone_id) {
            if count == 1 {
                counts.remove(building);
            } else {
                counts.insert(building.clone(), count - 1);
            }
        }
        let Some(zone) = state.zone_mut(zone_id) else {
            return Ok(Salvage::default());
        };
        let mass = cost.min(zone.structure_mass);
        let metal = mass * efficiency;
        let salvage = Salvage {
            metal_kg: metal,
            slag_kg: mass - metal,
        };
        zone.structure_mass = non_negative(zone.structure_mass - mass);
        zone.stored_metal += salvage.metal_kg;
        zone.slag_mass += salvage.slag_kg;
        tracing::info!(zone = %zone_id, %building, metal = salvage.metal_kg, "structure recycled");
        Ok(salvage)
    }

    fn recycle_slag(state: &mut GameState, ctx: &mut TickContext<'_>, zone_id: &ZoneId, efficiency: f64) {
        let rules = ctx.rules();
        let recyclers = state.probe_count(zone_id) * state.allocations(zone_id).recycle;
        if recyclers <= 0.0 {
            return;
        }
        let speed = non_negative(rules.skill_coefficients.recycling_speed.factor(&ctx.skills));
        let Some(zone) = state.zone_mut(zone_id) else {
            return;
        };
        let processed = (recyclers
            * rules.recycling.base_rate_kg_per_day
            * speed
            * ctx.energy_throttle
            * ctx.delta_days)
            .min(zone.slag_mass);
        if processed <= 0.0 {
            return;
        }
        let metal = processed * efficiency;
        // The unrecovered remainder stays in the slag pool.
        zone.slag_mass = non_negative(zone.slag_mass - metal);
        zone.stored_metal += metal;
        ctx.ledger.zone(zone_id).recycled_metal_kg += metal;
    }

    fn recycle_probes(state: &mut GameState, ctx: &mut TickContext<'_>, zone_id: &ZoneId, efficiency: f64) {
        let rules = ctx.rules();
        let probes = state.probe_count(zone_id);
        let share = state.allocations(zone_id).recycle_probes;
        let probe_mass_kg = rules.probe.mass_kg;
        if probes <= 0.0 || share <= 0.0 || probe_mass_kg <= 0.0 {
            return;
        }
        let target = clamp01(state.probe_recycle_target(zone_id));
        let Some(zone) = state.zone(zone_id) else {
            return;
        };
        let total = zone.total_mass();
        let ratio = safe_div(zone.probe_mass, total, 0.0);
        let ramp = Self::probe_recycle_ramp(ratio, target, rules.recycling.probe_ramp_band);
        if ramp <= 0.0 {
            return;
        }
        let surplus = non_negative(zone.probe_mass - target * total) / probe_mass_kg;
        let wanted = probes
            * share
            * rules.recycling.probe_dismantle_fraction_per_day
            * ramp
            * ctx.energy_throttle
            * ctx.delta_days;
        let removed = state.remove_probes(zone_id, wanted.min(surplus), probe_mass_kg);
        if removed <= 0.0 {
            return;
        }
        let mass = removed * probe_mass_kg;
        let metal = mass * efficiency;
        if let Some(zone) = state.zone_mut(zone_id) {
            zone.stored_metal += metal;
            zone.slag_mass += mass - metal;
        }
        let flows = ctx.ledger.zone(zone_id);
        flows.recycled_metal_kg += metal;
        flows.probes_recycled += removed;
    }
}

impl TickSystem for RecyclingSystem {
    fn name(&self) -> &'static str {
        "recycling"
    }

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>) {
        let efficiency = Self::efficiency(ctx.rules(), &ctx.skills);
        for zone_id in state.zone_ids() {
            Self::recycle_slag(state, ctx, &zone_id, efficiency);
        }
        for zone_id in state.zone_ids() {
            Self::recycle_probes(state, ctx, &zone_id, efficiency);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillName;
    use crate::state::ProbeAllocations;
    use crate::test_utils::*;

    fn run_recycling(state: &mut GameState, registry: &Registry, dt: f64) {
        let mut ctx = TickContext::new(registry, state, dt, 1.0);
        RecyclingSystem::new().run(state, &mut ctx);
    }

    // Test 1: Efficiency is capped
    #[test]
    fn efficiency_is_capped() {
        let rules = EconomicRules::default();
        assert_eq!(RecyclingSystem::efficiency(&rules, &Skills::baseline()), 0.75);
        let skilled = Skills::baseline().with(SkillName::Recycling, 5.0);
        assert_eq!(RecyclingSystem::efficiency(&rules, &skilled), 0.98);
    }

    // Test 2: Slag becomes metal with the remainder kept as slag
    #[test]
    fn slag_recycling_conserves_mass() {
        let registry = test_registry();
        let alloc = ProbeAllocations {
            recycle: 1.0,
            ..ProbeAllocations::idle()
        };
        let mut state = state_with_probes(&registry, &earth(), 2.0, alloc);
        state.zone_mut(&earth()).unwrap().slag_mass = 1_000.0;
        let before = zone_mass(&state, &earth());
        run_recycling(&mut state, &registry, 1.0);

        // 2 probes * 50 kg/day = 100 kg processed, 75 kg recovered
        let zone = state.zone(&earth()).unwrap();
        assert_eq!(zone.stored_metal, 75.0);
        assert_eq!(zone.slag_mass, 925.0);
        assert_eq!(zone_mass(&state, &earth()), before);
    }

    // Test 3: Probe recycling ramp
    #[test]
    fn ramp_shape() {
        assert_eq!(RecyclingSystem::probe_recycle_ramp(0.1, 0.2, 0.05), 0.0);
        assert_eq!(RecyclingSystem::probe_recycle_ramp(0.2, 0.2, 0.05), 0.0);
        assert!((RecyclingSystem::probe_recycle_ramp(0.225, 0.2, 0.05) - 0.5).abs() < 1e-12);
        assert_eq!(RecyclingSystem::probe_recycle_ramp(0.9, 0.2, 0.05), 1.0);
    }

    // Test 4: Probe recycling turns probes into metal and slag
    #[test]
    fn probe_recycling_conserves_mass() {
        let registry = test_registry();
        let alloc = ProbeAllocations {
            recycle_probes: 1.0,
            ..ProbeAllocations::idle()
        };
        let mut state = state_with_probes(&registry, &earth(), 2_000.0, alloc);
        let before = zone_mass(&state, &earth());
        run_recycling(&mut state, &registry, 1.0);

        // 2000 * 0.01/day = 20 probes
        assert!((state.probe_count(&earth()) - 1_980.0).abs() < 1e-9);
        let zone = state.zone(&earth()).unwrap();
        assert!((zone.stored_metal - 1_500.0).abs() < 1e-6);
        assert!((zone.slag_mass - 500.0).abs() < 1e-6);
        assert!((zone_mass(&state, &earth()) - before).abs() < 1e-6);
    }

    // Test 5: Probe recycling never goes below the target ratio
    #[test]
    fn probe_recycling_respects_target() {
        let registry = test_registry();
        let alloc = ProbeAllocations {
            recycle_probes: 1.0,
            ..ProbeAllocations::idle()
        };
        let mut state = state_with_probes(&registry, &earth(), 2_000.0, alloc);
        state.probe_recycle_targets.insert(earth(), 0.5);
        run_recycling(&mut state, &registry, 100.0);
        assert_eq!(state.probe_count(&earth()), 2_000.0);
    }

    // Test 6: Recycling a structure returns its mass
    #[test]
    fn structure_recycling_returns_mass() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 1.0, harvest_only());
        state.add_structure(&earth(), &building("power_station"));
        state.zone_mut(&earth()).unwrap().structure_mass = 1_000.0;
        let before = zone_mass(&state, &earth());

        let salvage =
            RecyclingSystem::recycle_structure(&mut state, &registry, &earth(), &building("power_station")).unwrap();
        assert_eq!(salvage.metal_kg, 750.0);
        assert_eq!(salvage.slag_kg, 250.0);
        assert_eq!(state.structure_count(&earth(), &building("power_station")), 0);
        assert_eq!(zone_mass(&state, &earth()), before);

        assert!(matches!(
            RecyclingSystem::recycle_structure(&mut state, &registry, &earth(), &building("power_station")),
            Err(RecyclingError::NothingToRecycle { .. })
        ));
    }
}

//! Dyson sphere construction and power output.
//!
//! Output is computed early in the tick from the sphere mass built so far and
//! feeds the energy balance and research. Construction runs later and only
//! in the designated Dyson zone, drawing that zone's stored metal at the
//! structure construction rate of its Dyson-allocated probes.

use crate::context::{TickContext, TickSystem};
use crate::numeric::{clamp01, finite_or_zero, non_negative, safe_div};
use crate::production::UpgradeFactors;
use crate::registry::Registry;
use crate::skills::Skills;
use crate::state::GameState;

#[derive(Debug, Default)]
pub struct DysonSystem;

impl DysonSystem {
    pub fn new() -> Self {
        Self
    }

    /// Target mass after the Dyson-construction skill discount.
    pub fn target_mass_kg(registry: &Registry, skills: &Skills) -> f64 {
        let rules = registry.rules();
        let bonus = non_negative(rules.skill_coefficients.dyson_construction.factor(skills) - 1.0);
        let reduction = (bonus * rules.dyson.mass_reduction_per_bonus).min(rules.dyson.max_mass_reduction);
        non_negative(rules.dyson.target_mass_kg * (1.0 - clamp01(reduction)))
    }

    /// Refresh the target mass and split the sphere's output between the
    /// economy and compute.
    pub fn update_output(state: &mut GameState, registry: &Registry, factors: &UpgradeFactors) {
        let rules = registry.rules();
        let dyson = &mut state.dyson;
        dyson.target_mass_kg = Self::target_mass_kg(registry, &state.skills);
        let area_m2 = safe_div(dyson.mass_kg, rules.dyson.mass_per_m2_kg, 0.0);
        let power_w = finite_or_zero(area_m2 * rules.dyson.power_per_m2_w * factors.dyson.energy.performance);
        let to_compute = clamp01(dyson.compute_allocation);
        dyson.compute_power_w = power_w * to_compute;
        dyson.economy_power_w = power_w - dyson.compute_power_w;
    }
}

impl TickSystem for DysonSystem {
    fn name(&self) -> &'static str {
        "dyson"
    }

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>) {
        let Some(zone_id) = ctx.registry.orbital().dyson_zone().cloned() else {
            return;
        };
        let plan = ctx.plan(&zone_id);
        let wanted = plan.dyson_kg * plan.metal_throttle;
        if wanted <= 0.0 {
            return;
        }
        let Some(zone) = state.zone_mut(&zone_id) else {
            return;
        };
        let metal = wanted.min(zone.stored_metal);
        zone.stored_metal = non_negative(zone.stored_metal - metal);
        state.dyson.mass_kg += metal;
        ctx.ledger.zone(&zone_id).dyson_kg += metal;
    }
}

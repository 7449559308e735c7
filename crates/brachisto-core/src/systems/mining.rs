//! Harvesting: raw zone mass into stored metal and slag.

use crate::context::{TickContext, TickSystem};
use crate::event::EconomyEvent;
use crate::numeric::non_negative;
use crate::production::ProductionCalculator;
use crate::state::GameState;

#[derive(Debug, Default)]
pub struct MiningSystem;

impl MiningSystem {
    pub fn new() -> Self {
        Self
    }
}

impl TickSystem for MiningSystem {
    fn name(&self) -> &'static str {
        "mining"
    }

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>) {
        for zone_id in state.zone_ids() {
            if ctx.registry.is_dyson_zone(&zone_id) {
                continue;
            }
            let rate = ctx.zone_rates(&zone_id).mining_kg_per_day;
            if rate <= 0.0 {
                continue;
            }
            let efficiency =
                ProductionCalculator::extraction_efficiency(state, &zone_id, ctx.registry, &ctx.skills);
            let Some(zone) = state.zone_mut(&zone_id) else {
                continue;
            };
            if zone.depleted {
                continue;
            }

            let wanted = non_negative(rate * ctx.energy_throttle * ctx.delta_days);
            let mined = wanted.min(zone.mass_remaining);
            let (metal, slag) = ProductionCalculator::calculate_metal_production_rate(mined, efficiency);

            if mined >= zone.mass_remaining {
                zone.mass_remaining = 0.0;
            } else {
                zone.mass_remaining -= mined;
            }
            zone.stored_metal += metal;
            zone.slag_mass += slag;

            let flows = ctx.ledger.zone(&zone_id);
            flows.mined_kg += mined;
            flows.metal_kg += metal;
            flows.slag_kg += slag;

            if zone.mass_remaining <= 0.0 {
                zone.depleted = true;
                tracing::info!(zone = %zone_id, "zone depleted");
                ctx.ledger.emit(EconomyEvent::ZoneDepleted {
                    zone: zone_id.clone(),
                    tick: ctx.tick,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::test_utils::*;

    fn run_mining<'a>(state: &mut GameState, registry: &'a Registry, dt: f64, throttle: f64) -> TickContext<'a> {
        let mut ctx = TickContext::new(registry, state, dt, throttle);
        MiningSystem::new().run(state, &mut ctx);
        ctx
    }

    // Test 1: One probe mines exactly its base rate times dt
    #[test]
    fn one_probe_mines_base_rate() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 1.0, harvest_only());
        let before = zone_mass(&state, &earth());
        let ctx = run_mining(&mut state, &registry, 0.5, 1.0);

        let zone = state.zone(&earth()).unwrap();
        assert_eq!(zone.mass_remaining, 1.0e6 - 50.0);
        assert_eq!(zone.stored_metal, 15.0);
        assert_eq!(zone.slag_mass, 35.0);
        assert_eq!(zone_mass(&state, &earth()), before);
        assert_eq!(ctx.ledger.flows(&earth()).mined_kg, 50.0);
    }

    // Test 2: Energy throttle scales mining
    #[test]
    fn throttle_scales_mining() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 1.0, harvest_only());
        run_mining(&mut state, &registry, 1.0, 0.5);
        assert_eq!(state.zone(&earth()).unwrap().mass_remaining, 1.0e6 - 50.0);
    }

    // Test 3: Mining stops at zero and flags depletion once
    #[test]
    fn depletion_is_flagged_and_final() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 1.0, harvest_only());
        state.zone_mut(&earth()).unwrap().mass_remaining = 30.0;
        // Heavily crowded, so give it a long tick.
        let ctx = run_mining(&mut state, &registry, 1_000.0, 1.0);

        let zone = state.zone(&earth()).unwrap();
        assert_eq!(zone.mass_remaining, 0.0);
        assert!(zone.depleted);
        assert_eq!(zone.stored_metal + zone.slag_mass, 30.0);
        assert!(matches!(ctx.ledger.events[0], EconomyEvent::ZoneDepleted { .. }));

        let ctx = run_mining(&mut state, &registry, 1_000.0, 1.0);
        assert!(ctx.ledger.events.is_empty());
        let zone = state.zone(&earth()).unwrap();
        assert_eq!(zone.stored_metal + zone.slag_mass, 30.0);
    }

    // Test 4: Idle probes mine nothing
    #[test]
    fn idle_probes_do_not_mine() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, crate::state::ProbeAllocations::idle());
        run_mining(&mut state, &registry, 1.0, 1.0);
        assert_eq!(state.zone(&earth()).unwrap().mass_remaining, 1.0e6);
    }
}

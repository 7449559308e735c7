//! Structure construction and refinery methalox output.
//!
//! # Construction
//!
//! Every enabled `zone::building` slot in a zone receives an equal share of
//! the zone's construction pool (the construct-allocated build rate, scaled by
//! the energy and metal throttles). Metal moves 1:1 from `stored_metal` into
//! `structure_mass` as it is invested, so the zone's mass is conserved at
//! every tick, not only on completion. When the invested metal reaches the
//! slot's geometrically scaled cost the count increments and progress resets.
//!
//! A slot switches itself off when it reaches its optional target count or
//! the building's per-zone limit.
//!
//! # Methalox
//!
//! Refineries turn part of the slag mined in their zone this tick into
//! methalox, up to their rated output.

use crate::context::{TickContext, TickSystem};
use crate::event::{ConstructionStop, EconomyEvent};
use crate::id::ConstructionKey;
use crate::numeric::non_negative;
use crate::state::GameState;

#[derive(Debug, Default)]
pub struct StructureSystem;

impl StructureSystem {
    pub fn new() -> Self {
        Self
    }

    fn construct(state: &mut GameState, ctx: &mut TickContext<'_>) {
        let rules = ctx.rules();
        for zone_id in state.zone_ids() {
            let keys: Vec<ConstructionKey> = state
                .enabled_in_zone(&zone_id)
                .filter(|key| ctx.registry.building(&key.building).is_some())
                .cloned()
                .collect();
            if keys.is_empty() {
                continue;
            }
            let plan = ctx.plan(&zone_id);
            let share = plan.construct_kg * plan.metal_throttle / keys.len() as f64;
            if share <= 0.0 {
                continue;
            }

            for key in keys {
                let Some(def) = ctx.registry.building(&key.building) else {
                    continue;
                };
                let count = state.structure_count(&zone_id, &key.building);
                let cost = def.cost_kg(count, rules);
                let invested = state.construction_progress.get(&key).copied().unwrap_or(0.0);
                let remaining = non_negative(cost - invested);

                let Some(zone) = state.zone_mut(&zone_id) else {
                    continue;
                };
                let amount = share.min(remaining).min(zone.stored_metal);
                if amount <= 0.0 && remaining > 0.0 {
                    continue;
                }
                zone.stored_metal = non_negative(zone.stored_metal - amount);
                zone.structure_mass += amount;
                ctx.ledger.zone(&zone_id).construction_kg += amount;

                if amount < remaining {
                    state.construction_progress.insert(key, invested + amount);
                    continue;
                }

                state.construction_progress.insert(key.clone(), 0.0);
                let built = state.add_structure(&zone_id, &key.building);
                tracing::info!(zone = %zone_id, building = %key.building, count = built, "structure completed");
                ctx.ledger.emit(EconomyEvent::StructureCompleted {
                    zone: zone_id.clone(),
                    building: key.building.clone(),
                    count: built,
                    tick: ctx.tick,
                });

                let stop = if state.construction_targets.get(&key).is_some_and(|&t| built >= t) {
                    Some(ConstructionStop::TargetReached)
                } else if def.max_per_zone.is_some_and(|max| built >= max) {
                    Some(ConstructionStop::ZoneLimitReached)
                } else {
                    None
                };
                if let Some(reason) = stop {
                    state.enabled_construction.remove(&key);
                    state.construction_targets.remove(&key);
                    tracing::debug!(%key, ?reason, "construction slot disabled");
                    ctx.ledger.emit(EconomyEvent::ConstructionStopped {
                        zone: zone_id.clone(),
                        building: key.building.clone(),
                        reason,
                        tick: ctx.tick,
                    });
                }
            }
        }
    }

    fn refine_methalox(state: &mut GameState, ctx: &mut TickContext<'_>) {
        for zone_id in state.zone_ids() {
            let capacity: f64 = state
                .structures_in(&zone_id)
                .filter_map(|(id, n)| ctx.registry.building(id).map(|d| n as f64 * d.methalox_kg_per_day))
                .sum();
            if capacity <= 0.0 {
                continue;
            }
            let fresh_slag = ctx.ledger.flows(&zone_id).slag_kg;
            let Some(zone) = state.zone_mut(&zone_id) else {
                continue;
            };
            let produced = (capacity * ctx.energy_throttle * ctx.delta_days)
                .min(fresh_slag)
                .min(zone.slag_mass);
            if produced <= 0.0 {
                continue;
            }
            zone.slag_mass = non_negative(zone.slag_mass - produced);
            zone.methalox += produced;
            // `slag_kg` keeps the mining split; refining shows up only here.
            ctx.ledger.zone(&zone_id).methalox_kg += produced;
        }
    }
}

impl TickSystem for StructureSystem {
    fn name(&self) -> &'static str {
        "structures"
    }

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>) {
        Self::construct(state, ctx);
        Self::refine_methalox(state, ctx);
    }
}

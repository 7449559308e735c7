//! Probe self-replication.
//!
//! Replicate-allocated probes turn stored metal into new probes at one probe
//! mass of metal per probe. Counts are continuous, so a tick may add a
//! fraction of a probe.

use crate::context::{TickContext, TickSystem};
use crate::numeric::{non_negative, safe_div};
use crate::state::GameState;

#[derive(Debug, Default)]
pub struct ProbeSystem;

impl ProbeSystem {
    pub fn new() -> Self {
        Self
    }
}

impl TickSystem for ProbeSystem {
    fn name(&self) -> &'static str {
        "probes"
    }

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>) {
        let probe_mass = ctx.rules().probe.mass_kg;
        if probe_mass <= 0.0 {
            return;
        }
        for zone_id in state.zone_ids() {
            let plan = ctx.plan(&zone_id);
            let wanted = plan.replicate_kg * plan.metal_throttle;
            if wanted <= 0.0 {
                continue;
            }
            let Some(zone) = state.zone_mut(&zone_id) else {
                continue;
            };
            let metal = wanted.min(zone.stored_metal);
            zone.stored_metal = non_negative(zone.stored_metal - metal);
            let built = safe_div(metal, probe_mass, 0.0);
            state.add_probes(&zone_id, built, probe_mass);
            ctx.ledger.zone(&zone_id).probes_built += built;
        }
    }
}

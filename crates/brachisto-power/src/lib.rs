//! Global energy balance for the Brachisto economy.
//!
//! Sums power production (base supply, probe generation, power structures
//! and the economy share of the Dyson sphere) against consumption (active
//! probe work and structure upkeep), and derives a single global throttle in
//! `[0, 1]` that scales mining, construction, replication and Dyson work.
//!
//! # Design
//!
//! - One network: the whole system shares one balance.
//! - Consumption costs are base costs times the skill cost factor, which is
//!   the reciprocal of a clamped reduction factor.
//! - Idle probes draw nothing.
//! - Storage structures bank surplus energy and cover a deficit before
//!   the throttle drops.
//! - Events fire only on *transitions*, not every tick.

use brachisto_core::numeric::{finite_or_zero, non_negative};
use brachisto_core::production::UpgradeFactors;
use brachisto_core::registry::Registry;
use brachisto_core::skills::Skills;
use brachisto_core::state::{EnergyBalance, EnergyStorage, GameState};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

/// Where the power comes from and where it goes, in watts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBreakdown {
    pub base_supply_w: f64,
    pub probe_generation_w: f64,
    pub structure_generation_w: f64,
    pub dyson_w: f64,
    pub mining_w: f64,
    pub building_w: f64,
    pub recycling_w: f64,
    pub dyson_construction_w: f64,
    pub structure_upkeep_w: f64,
}

impl EnergyBreakdown {
    pub fn production_w(&self) -> f64 {
        self.base_supply_w + self.probe_generation_w + self.structure_generation_w + self.dyson_w
    }

    pub fn consumption_w(&self) -> f64 {
        self.mining_w + self.building_w + self.recycling_w + self.dyson_construction_w + self.structure_upkeep_w
    }

    pub fn balance(&self) -> EnergyBalance {
        let production_w = finite_or_zero(self.production_w());
        let consumption_w = finite_or_zero(self.consumption_w());
        EnergyBalance {
            production_w,
            consumption_w,
            net_w: production_w - consumption_w,
            throttle: EnergyCalculator::throttle(production_w, consumption_w),
        }
    }
}

// ---------------------------------------------------------------------------
// Power events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PowerEvent {
    /// The throttle fell below 1.
    Brownout {
        deficit_w: f64,
        throttle: f64,
        tick: u64,
    },
    /// The throttle returned to 1.
    Restored { tick: u64 },
}

// ---------------------------------------------------------------------------
// EnergyCalculator
// ---------------------------------------------------------------------------

/// Computes the energy balance and tracks brownout transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnergyCalculator {
    was_brownout: bool,
}

impl EnergyCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_brownout(&self) -> bool {
        self.was_brownout
    }

    /// `min(1, production / consumption)`, or 1 when nothing consumes.
    pub fn throttle(production_w: f64, consumption_w: f64) -> f64 {
        if !(consumption_w > 0.0) {
            return 1.0;
        }
        (non_negative(production_w) / consumption_w).clamp(0.0, 1.0)
    }

    pub fn calculate_breakdown(state: &GameState, registry: &Registry, factors: &UpgradeFactors) -> EnergyBreakdown {
        let rules = registry.rules();
        let probe = &rules.probe;
        let mut b = EnergyBreakdown {
            base_supply_w: non_negative(rules.energy.base_supply_w),
            probe_generation_w: state.total_probes()
                * probe.base_energy_production_w
                * factors.probe.energy.performance,
            dyson_w: non_negative(state.dyson.economy_power_w),
            ..EnergyBreakdown::default()
        };

        for zone_id in state.zones.keys() {
            let probes = state.probe_count(zone_id);
            let alloc = state.allocations(zone_id);
            let is_dyson = registry.is_dyson_zone(zone_id);

            if !is_dyson {
                b.mining_w += probes * alloc.harvest * probe.mining_energy_cost_w * factors.probe.mining.cost;
            }
            b.building_w += probes
                * (alloc.construct + alloc.replicate)
                * probe.build_energy_cost_w
                * factors.probe.building.cost;
            b.recycling_w += probes
                * (alloc.recycle + alloc.recycle_probes)
                * probe.recycle_energy_cost_w
                * factors.probe.building.cost;
            if is_dyson {
                b.dyson_construction_w +=
                    probes * alloc.dyson * probe.dyson_energy_cost_w * factors.dyson.building.cost;
            }

            for (id, count) in state.structures_in(zone_id) {
                let Some(def) = registry.building(id) else {
                    continue;
                };
                let n = count as f64;
                b.structure_generation_w += n * def.power_output_mw * 1e6 * factors.structure.energy.performance;
                let cost = if def.compute_eflops > 0.0 {
                    factors.structure.compute.cost
                } else {
                    factors.structure.energy.cost
                };
                b.structure_upkeep_w += n * def.energy_cost_multiplier * rules.structures.base_energy_cost_w * cost;
            }
        }
        b
    }

    /// Production, consumption, net and throttle for the current state.
    pub fn calculate_energy_balance(state: &GameState, registry: &Registry, factors: &UpgradeFactors) -> EnergyBalance {
        Self::calculate_breakdown(state, registry, factors).balance()
    }

    /// Total storage capacity in watt-days: every storage structure's
    /// capacity times the storage skill factor.
    pub fn storage_capacity_wd(state: &GameState, registry: &Registry, skills: &Skills) -> f64 {
        let per_structure: f64 = state
            .structures_by_zone
            .values()
            .flat_map(|buildings| buildings.iter())
            .filter_map(|(id, &count)| Some(count as f64 * non_negative(registry.building(id)?.energy_storage_wd)))
            .sum();
        let skill = registry.rules().skill_coefficients.energy_storage.factor(skills);
        non_negative(per_structure * non_negative(skill))
    }

    /// Bank a surplus or cover a deficit from storage for `delta_days`.
    ///
    /// A surplus charges up to capacity. A deficit that storage covers in
    /// full leaves the throttle at 1 and the net at 0. Otherwise storage is
    /// emptied and the throttle stays at `production / consumption`.
    pub fn apply_storage(balance: EnergyBalance, storage: &mut EnergyStorage, delta_days: f64) -> EnergyBalance {
        let capacity = non_negative(storage.capacity_wd);
        let stored = non_negative(storage.stored_wd);
        let net_wd = finite_or_zero(balance.net_w * non_negative(delta_days));
        let mut out = balance;

        storage.stored_wd = if net_wd > 0.0 {
            stored + net_wd
        } else if net_wd < 0.0 && stored >= -net_wd {
            out.net_w = 0.0;
            out.throttle = 1.0;
            stored + net_wd
        } else if net_wd < 0.0 {
            0.0
        } else {
            stored
        }
        .clamp(0.0, capacity);
        out
    }

    /// Record this tick's balance and return an event if the brownout state
    /// changed.
    pub fn observe(&mut self, balance: &EnergyBalance, tick: u64) -> Option<PowerEvent> {
        let is_brownout = balance.throttle < 1.0;
        match (self.was_brownout, is_brownout) {
            (false, true) => {
                self.was_brownout = true;
                tracing::warn!(
                    throttle = balance.throttle,
                    deficit_w = -balance.net_w,
                    "energy brownout"
                );
                Some(PowerEvent::Brownout {
                    deficit_w: non_negative(-balance.net_w),
                    throttle: balance.throttle,
                    tick,
                })
            }
            (true, false) => {
                self.was_brownout = false;
                tracing::info!("energy restored");
                Some(PowerEvent::Restored { tick })
            }
            _ => None,
        }
    }
}

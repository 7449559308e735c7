//! Research progress records and intelligence production.
//!
//! Tree definitions and the tier state machine live in the tech-tree crate;
//! the per-tier progress they mutate is stored here so that it travels with
//! [`GameState`] in every snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{TierId, TreeId};
use crate::numeric::{finite_or_zero, non_negative};
use crate::production::{ProductionCalculator, UpgradeFactors};
use crate::registry::Registry;
use crate::skills::Skills;
use crate::state::GameState;

/// Progress of one tier. `progress` is FLOP·days invested toward the next
/// tranche.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierProgress {
    pub tranches_completed: u32,
    pub progress: f64,
    pub enabled: bool,
}

/// `tree -> tier -> progress`. Tiers never touched have no entry.
pub type ResearchProgress = BTreeMap<TreeId, BTreeMap<TierId, TierProgress>>;

pub struct ResearchCalculator;

impl ResearchCalculator {
    /// Intelligence produced this tick, in FLOPS.
    ///
    /// Base onboard compute plus compute structures and the compute share of
    /// Dyson output, each scaled by its compute performance factor, then by
    /// the research-rate skill and the energy throttle.
    pub fn intelligence_flops(
        state: &GameState,
        registry: &Registry,
        factors: &UpgradeFactors,
        skills: &Skills,
        energy_throttle: f64,
    ) -> f64 {
        let rules = registry.rules();
        let structure_eflops: f64 = state
            .zones
            .keys()
            .map(|zone| ProductionCalculator::structure_sum(state, zone, registry, |d| d.compute_eflops))
            .sum();
        let structures = structure_eflops * 1e18 * factors.structure.compute.performance;
        let dyson = state.dyson.compute_power_w
            * rules.compute.flops_per_watt
            * factors.dyson.compute.performance;
        let rate = non_negative(rules.skill_coefficients.research_rate.factor(skills));
        finite_or_zero((rules.compute.base_flops + structures + dyson) * rate * energy_throttle.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillName;
    use crate::test_utils::*;

    // Test 1: With nothing built only base compute counts
    #[test]
    fn base_flops_only() {
        let registry = test_registry();
        let state = GameState::new();
        let f = UpgradeFactors::default();
        let flops = ResearchCalculator::intelligence_flops(&state, &registry, &f, &Skills::baseline(), 1.0);
        assert_eq!(flops, registry.rules().compute.base_flops);
    }

    // Test 2: Data centers add their exaflops
    #[test]
    fn data_centers_add_compute() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 0.0, harvest_only());
        state.add_structure(&earth(), &building("data_center"));
        let f = UpgradeFactors::default();
        let flops = ResearchCalculator::intelligence_flops(&state, &registry, &f, &Skills::baseline(), 1.0);
        assert_eq!(flops, registry.rules().compute.base_flops + 1e18);
    }

    // Test 3: Dyson compute power converts at flops per watt
    #[test]
    fn dyson_compute_power_counts() {
        let registry = test_registry();
        let mut state = GameState::new();
        state.dyson.compute_power_w = 1_000.0;
        let f = UpgradeFactors::default();
        let flops = ResearchCalculator::intelligence_flops(&state, &registry, &f, &Skills::baseline(), 1.0);
        assert_eq!(flops, registry.rules().compute.base_flops + 1e12);
    }

    // Test 4: Research-rate skill and throttle scale the total
    #[test]
    fn research_rate_and_throttle_scale() {
        let registry = test_registry();
        let state = GameState::new();
        let f = UpgradeFactors::default();
        let skills = Skills::baseline().with(SkillName::ResearchRate, 3.0);
        let flops = ResearchCalculator::intelligence_flops(&state, &registry, &f, &skills, 0.5);
        // research_rate factor: 1 + 0.5 * 2 = 2
        assert_eq!(flops, registry.rules().compute.base_flops);
    }

    // Test 5: Progress records serialize by tree and tier
    #[test]
    fn progress_map_is_keyed_by_tree_and_tier() {
        let mut research = ResearchProgress::new();
        research
            .entry(TreeId::from("propulsion"))
            .or_default()
            .insert(TierId::from("t1"), TierProgress { tranches_completed: 2, progress: 5.0, enabled: true });
        let tier = research[&TreeId::from("propulsion")][&TierId::from("t1")];
        assert_eq!(tier.tranches_completed, 2);
        assert!(tier.enabled);
    }
}

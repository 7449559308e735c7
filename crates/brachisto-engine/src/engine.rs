//! The game engine: owns the state and runs the tick pipeline.
//!
//! # Pipeline
//!
//! Each [`GameEngine::tick`] runs, in order:
//!
//! 1. **Time** -- advance the clock; speed scales delta days.
//! 2. **Skills** -- reload skills from the research tree.
//! 3. **Bonuses** -- apply the starting-bonus multipliers.
//! 4. **Research** -- spend last tick's intelligence, then reload skills.
//! 5. **Factors** -- recompute upgrade factors.
//! 6. **Dyson output** -- power and compute from the sphere.
//! 7. **Energy** -- global balance, storage, then throttle.
//! 8. **Mining**
//! 9. **Structures** -- construction and methalox refining.
//! 10. **Probes** -- replication.
//! 11. **Dyson** -- sphere construction.
//! 12. **Transfers**
//! 13. **Recycling** -- slag, then probe self-recycling.
//! 14. **Rates** -- per-day display rates from this tick's flows.
//! 15. **Derived** -- per-zone and total economics.
//! 16. **Stats** -- cumulative totals and history.
//!
//! Steps 8 to 13 are [`TickSystem`]s sharing one [`TickContext`].
//!
//! # Snapshots
//!
//! The state lives behind an [`Arc`]. [`GameEngine::state`] hands out a
//! cheap shared snapshot; the next mutation clones the state if a snapshot
//! is still alive, so callers never observe a half-applied tick.

use std::path::Path;
use std::sync::Arc;

use brachisto_core::context::{TickContext, TickSystem};
use brachisto_core::event::EconomyEvent;
use brachisto_core::hash::StateHash;
use brachisto_core::numeric::{clamp01, safe_div};
use brachisto_core::production::ProductionCalculator;
use brachisto_core::recycling::RecyclingSystem;
use brachisto_core::registry::Registry;
use brachisto_core::research::ResearchCalculator;
use brachisto_core::skills::{CompositeSkillsCalculator, SkillName, Skills, SkillsCalculator};
use brachisto_core::state::{DerivedEconomics, GameState, Rates, ZoneEconomics};
use brachisto_core::systems::{DysonSystem, MiningSystem, ProbeSystem, StructureSystem};
use brachisto_core::time::TimeManager;
use brachisto_core::transfer::TransferSystem;
use brachisto_data::GameData;
use brachisto_power::{EnergyBreakdown, EnergyCalculator, PowerEvent};
use brachisto_stats::StatsTracker;
use brachisto_tech_tree::{TechEvent, TechTree};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig};

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub time_days: f64,
    pub delta_days: f64,
    pub energy_throttle: f64,
    pub events: Vec<EconomyEvent>,
    pub tech_events: Vec<TechEvent>,
    pub power_event: Option<PowerEvent>,
    pub state_hash: u64,
}

// ---------------------------------------------------------------------------
// GameEngine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GameEngine {
    pub(crate) registry: Arc<Registry>,
    pub(crate) state: Arc<GameState>,
    pub(crate) time: TimeManager,
    pub(crate) tech_tree: TechTree,
    pub(crate) energy: EnergyCalculator,
    pub(crate) stats: StatsTracker,
    pub(crate) config: EngineConfig,
    pub(crate) last_state_hash: u64,
    mining: MiningSystem,
    /// Everything after mining and build planning, in pipeline order.
    systems: Vec<Box<dyn TickSystem>>,
}

pub(crate) fn default_systems() -> Vec<Box<dyn TickSystem>> {
    vec![
        Box::new(StructureSystem::new()),
        Box::new(ProbeSystem::new()),
        Box::new(DysonSystem::new()),
        Box::new(TransferSystem::new()),
        Box::new(RecyclingSystem::new()),
    ]
}

impl GameEngine {
    /// Start a new game.
    pub fn new(registry: Registry, tech_tree: TechTree, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = initial_state(&registry, &config)?;
        let time = TimeManager::new(config.time.days_per_tick, config.time_speed()?);
        let stats = StatsTracker::new(config.stats.clone());
        let mut engine = Self::assemble(registry, state, time, tech_tree, EnergyCalculator::new(), stats, config);
        engine.prime();
        tracing::info!(
            zones = engine.state.zones.len(),
            probes = engine.state.total_probes(),
            "game started"
        );
        Ok(engine)
    }

    pub fn from_game_data(data: &GameData, config: EngineConfig) -> Result<Self, ConfigError> {
        let tech_tree = data.tech_tree()?;
        Self::new(data.registry.clone(), tech_tree, config)
    }

    /// Load static data and engine config from `dir` and start a game.
    /// Broken static data falls back to the built-in defaults.
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let data = brachisto_data::load_game_data_or_default(dir);
        let config = EngineConfig::load(dir)?;
        Self::from_game_data(&data, config)
    }

    pub(crate) fn assemble(
        registry: Registry,
        state: GameState,
        time: TimeManager,
        tech_tree: TechTree,
        energy: EnergyCalculator,
        stats: StatsTracker,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            state: Arc::new(state),
            time,
            tech_tree,
            energy,
            stats,
            config,
            last_state_hash: 0,
            mining: MiningSystem::new(),
            systems: default_systems(),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Read-only snapshot of the current state.
    pub fn state(&self) -> Arc<GameState> {
        Arc::clone(&self.state)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tech_tree(&self) -> &TechTree {
        &self.tech_tree
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    pub fn time(&self) -> &TimeManager {
        &self.time
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_brownout(&self) -> bool {
        self.energy.is_brownout()
    }

    /// Per-source power figures for the current state.
    pub fn energy_breakdown(&self) -> EnergyBreakdown {
        EnergyCalculator::calculate_breakdown(&self.state, &self.registry, &self.state.upgrade_factors)
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Skills from research plus starting bonuses.
    fn current_skills(&self) -> Skills {
        let legacy = self.tech_tree.legacy_skills(self.registry.rules().research.tier_bonus_decay);
        let mut skills = SkillsCalculator::from_legacy(&legacy);
        let bonuses = self.config.starting_bonuses;
        skills.scale(&SkillName::COMPUTE, bonuses.compute);
        skills.scale(&SkillName::ENERGY, bonuses.energy);
        skills.scale(&SkillName::DEXTERITY, bonuses.dexterity);
        skills
    }

    /// Recompute everything derived from skills without advancing time.
    pub(crate) fn prime(&mut self) {
        let registry = Arc::clone(&self.registry);
        let skills = self.current_skills();
        let factors = ProductionCalculator::calculate_upgrade_factors(&skills, registry.rules());
        let state = Arc::make_mut(&mut self.state);
        state.skills = skills;
        state.composite_skills = CompositeSkillsCalculator::calculate(&skills);
        state.upgrade_factors = factors;
        DysonSystem::update_output(state, &registry, &factors);
        state.energy = EnergyCalculator::calculate_energy_balance(state, &registry, &factors);
        state.energy_storage.capacity_wd = EnergyCalculator::storage_capacity_wd(state, &registry, &skills);
        state.intelligence_flops =
            ResearchCalculator::intelligence_flops(state, &registry, &factors, &skills, state.energy.throttle);
        state.research = self.tech_tree.export_state();
        state.derived = derive_economics(state, &registry);
        self.last_state_hash = StateHash::of_state(state);
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickReport {
        let registry = Arc::clone(&self.registry);
        let rules = registry.rules();

        // 1. Time.
        let delta_days = self.time.advance();
        let tick = self.time.tick();

        // 2-3. Skills and starting bonuses.
        let skills = self.current_skills();
        Arc::make_mut(&mut self.state).skills = skills;

        // 4. Research on last tick's intelligence, then reload skills.
        let intelligence = self.state.intelligence_flops;
        if !self.tech_tree.enabled_projects().is_empty() {
            self.tech_tree.advance(intelligence, delta_days, tick);
            self.stats.record_research(intelligence * delta_days);
        }
        let skills = self.current_skills();

        // 5. Upgrade factors.
        let factors = ProductionCalculator::calculate_upgrade_factors(&skills, rules);

        let state = Arc::make_mut(&mut self.state);
        state.tick = tick;
        state.time_days = self.time.time_days();
        state.skills = skills;
        state.composite_skills = CompositeSkillsCalculator::calculate(&skills);
        state.upgrade_factors = factors;

        // 6. Dyson output.
        DysonSystem::update_output(state, &registry, &factors);

        // 7. Energy. Storage charges or covers the deficit before the throttle.
        let raw = EnergyCalculator::calculate_energy_balance(state, &registry, &factors);
        state.energy_storage.capacity_wd = EnergyCalculator::storage_capacity_wd(state, &registry, &skills);
        let balance = EnergyCalculator::apply_storage(raw, &mut state.energy_storage, delta_days);
        state.energy = balance;
        let power_event = self.energy.observe(&balance, tick);
        state.intelligence_flops =
            ResearchCalculator::intelligence_flops(state, &registry, &factors, &skills, balance.throttle);

        // 8-13. Systems.
        let mut ctx = TickContext::new(&registry, state, delta_days, balance.throttle);
        self.mining.run(state, &mut ctx);
        ctx.plan_builds(state);
        for system in &mut self.systems {
            system.run(state, &mut ctx);
        }
        for zone in state.zones.values_mut() {
            zone.sanitize();
        }

        // 14. Rates.
        let mut rates = Rates::default();
        for (zone, flows) in &ctx.ledger.zones {
            let per_day = flows.per_day(delta_days);
            rates.total.accumulate(&per_day);
            rates.zones.insert(zone.clone(), per_day);
        }
        state.rates = rates;

        // 15. Derived economics.
        state.research = self.tech_tree.export_state();
        state.derived = derive_economics(state, &registry);

        // 16. Stats.
        let events = ctx.ledger.drain_events();
        for flows in ctx.ledger.zones.values() {
            self.stats.record_flows(flows);
        }
        for event in &events {
            self.stats.process_event(event);
        }
        self.stats.end_tick(state, delta_days);

        let state_hash = StateHash::of_state(state);
        self.last_state_hash = state_hash;
        tracing::debug!(tick, delta_days, throttle = balance.throttle, "tick");

        TickReport {
            tick,
            time_days: self.time.time_days(),
            delta_days,
            energy_throttle: balance.throttle,
            events,
            tech_events: self.tech_tree.drain_events(),
            power_event,
            state_hash,
        }
    }

    /// Run `n` ticks and return their reports.
    pub fn run(&mut self, n: u64) -> Vec<TickReport> {
        (0..n).map(|_| self.tick()).collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn initial_state(registry: &Registry, config: &EngineConfig) -> Result<GameState, ConfigError> {
    let rules = registry.rules();
    let home = &config.default_zone;
    if registry.zone(home).is_none() {
        return Err(ConfigError::Invalid {
            field: "default_zone",
            reason: format!("unknown zone '{home}'"),
        });
    }

    let mut state = GameState::new();
    for zone in registry.orbital().zones() {
        state.ensure_zone(&zone.id, registry);
    }
    state.add_probes(home, config.initial_probes, rules.probe.mass_kg);
    state.probe_allocations.insert(home.clone(), config.initial_allocations);
    if let Some(zone) = state.zone_mut(home) {
        zone.stored_metal += config.initial_metal_kg;
    }
    for (building, &count) in &config.initial_structures {
        let def = registry.building(building).ok_or_else(|| ConfigError::Invalid {
            field: "initial_structures",
            reason: format!("unknown building '{building}'"),
        })?;
        for _ in 0..count {
            let mass = def.cost_kg(state.structure_count(home, building), rules);
            state.add_structure(home, building);
            if let Some(zone) = state.zone_mut(home) {
                zone.structure_mass += mass;
            }
        }
    }
    state.dyson.compute_allocation = clamp01(config.dyson_power_allocation / 100.0);
    Ok(state)
}

pub(crate) fn derive_economics(state: &GameState, registry: &Registry) -> DerivedEconomics {
    let mut derived = DerivedEconomics::default();
    for (id, zone) in &state.zones {
        let def = registry.zone(id);
        let metal_percentage = def.map(|d| d.metal_percentage).unwrap_or(0.0);
        let initial_mass = def.map(|d| d.total_mass_kg).unwrap_or(0.0);
        let structure_count: u32 = state.structures_in(id).map(|(_, n)| n).sum();
        let probe_count = state.probe_count(id);
        let depletion_fraction = if initial_mass > 0.0 && !registry.is_dyson_zone(id) {
            clamp01(1.0 - zone.mass_remaining / initial_mass)
        } else {
            0.0
        };
        derived.zones.insert(
            id.clone(),
            ZoneEconomics {
                metal_remaining_kg: zone.metal_remaining(metal_percentage),
                probe_count,
                probe_mass_ratio: safe_div(zone.probe_mass, zone.total_mass(), 0.0),
                structure_count,
                depletion_fraction,
            },
        );
        derived.total_probes += probe_count;
        derived.total_stored_metal += zone.stored_metal;
        derived.total_structures = derived.total_structures.saturating_add(structure_count);
    }
    let (probes, metal) = TransferSystem::in_flight_totals(state);
    derived.probes_in_flight = probes;
    derived.metal_in_flight = metal;
    derived.dyson_completion = state.dyson.completion();
    derived
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Shared fixtures for unit and integration tests.
//!
//! Zones in the fixture registry are tiny (1e6 kg) so that per-tick mass
//! changes are exactly representable, and the base energy supply is large
//! enough that nothing is throttled unless a test asks for it.

use crate::id::{BuildingId, ZoneId};
use crate::orbital::ZoneDef;
use crate::registry::{BuildingCategory, BuildingDef, Registry, RegistryBuilder};
use crate::rules::EconomicRules;
use crate::state::{GameState, ProbeAllocations};

pub fn earth() -> ZoneId {
    ZoneId::from("earth")
}

pub fn mars() -> ZoneId {
    ZoneId::from("mars")
}

pub fn mercury() -> ZoneId {
    ZoneId::from("mercury")
}

pub fn dyson_zone() -> ZoneId {
    ZoneId::from("dyson_sphere")
}

pub fn building(id: &str) -> BuildingId {
    BuildingId::from(id)
}

/// Default rules with abundant base power.
pub fn test_rules() -> EconomicRules {
    let mut rules = EconomicRules::default();
    rules.energy.base_supply_w = 1e15;
    rules
}

pub fn test_zones() -> Vec<ZoneDef> {
    vec![
        ZoneDef::dyson("dyson_sphere", 0.29),
        ZoneDef::new("mercury", 0.39, 1.0e6, 0.7),
        ZoneDef::new("earth", 1.0, 1.0e6, 0.3),
        ZoneDef::new("mars", 1.52, 1.0e6, 0.25),
    ]
}

pub fn test_buildings() -> Vec<BuildingDef> {
    let mut power_station = BuildingDef::new("power_station", BuildingCategory::Energy);
    power_station.mass_kg = Some(1_000.0);
    power_station.power_output_mw = 1.0;
    power_station.max_per_zone = Some(5);

    let mut mining_station = BuildingDef::new("mining_station", BuildingCategory::Mining);
    mining_station.mass_kg = Some(2_000.0);
    mining_station.mining_rate_multiplier = 0.5;
    mining_station.energy_cost_multiplier = 1.0;

    let mut refinery = BuildingDef::new("refinery", BuildingCategory::Refining);
    refinery.mass_kg = Some(1_500.0);
    refinery.extraction_bonus = 0.1;
    refinery.methalox_kg_per_day = 10.0;
    refinery.allowed_orbital_zones = vec![earth(), mars()];

    let mut data_center = BuildingDef::new("data_center", BuildingCategory::Compute);
    data_center.mass_kg = Some(5_000.0);
    data_center.compute_eflops = 1.0;

    let mut mass_driver = BuildingDef::new("mass_driver", BuildingCategory::Logistics);
    mass_driver.mass_kg = Some(3_000.0);
    mass_driver.mass_driver_capacity_kg_per_day = 1_000.0;

    let mut factory = BuildingDef::new("factory", BuildingCategory::Production);
    factory.mass_kg = Some(1_000.0);
    factory.build_rate_multiplier = 0.5;
    factory.geometric_scaling_exponent = 1.5;

    let mut battery_bank = BuildingDef::new("battery_bank", BuildingCategory::Storage);
    battery_bank.mass_kg = Some(500.0);
    battery_bank.energy_storage_wd = 1_000_000.0;

    vec![
        power_station,
        mining_station,
        refinery,
        data_center,
        mass_driver,
        factory,
        battery_bank,
    ]
}

pub fn test_registry_with_rules(rules: EconomicRules) -> Registry {
    let mut builder = RegistryBuilder::new();
    for zone in test_zones() {
        builder
            .register_zone(zone)
            .expect("fixture zones are valid");
    }
    for def in test_buildings() {
        builder
            .register_building(def)
            .expect("fixture buildings are unique");
    }
    builder.rules(rules);
    builder.build()
}

pub fn test_registry() -> Registry {
    test_registry_with_rules(test_rules())
}

/// A state with `count` probes in `zone` under the given allocations.
pub fn state_with_probes(
    registry: &Registry,
    zone: &ZoneId,
    count: f64,
    allocations: ProbeAllocations,
) -> GameState {
    let mut state = GameState::new();
    state.ensure_zone(zone, registry);
    state.add_probes(zone, count, registry.rules().probe.mass_kg);
    state.probe_allocations.insert(zone.clone(), allocations);
    state
}

pub fn harvest_only() -> ProbeAllocations {
    ProbeAllocations {
        harvest: 1.0,
        ..ProbeAllocations::idle()
    }
}

pub fn replicate_only() -> ProbeAllocations {
    ProbeAllocations {
        replicate: 1.0,
        ..ProbeAllocations::idle()
    }
}

pub fn construct_only() -> ProbeAllocations {
    ProbeAllocations {
        construct: 1.0,
        ..ProbeAllocations::idle()
    }
}

/// Sum of every mass pool in a zone, for conservation checks.
pub fn zone_mass(state: &GameState, zone: &ZoneId) -> f64 {
    state.zone(zone).map(|z| z.total_mass()).unwrap_or(0.0)
}

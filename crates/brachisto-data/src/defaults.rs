//! Built-in static data used when a data file is missing.

use std::collections::BTreeMap;

use brachisto_core::id::{TierId, TreeId, ZoneId};
use brachisto_core::registry::{BuildingCategory, BuildingDef};
use brachisto_tech_tree::{ResearchCategory, ResearchTreeDef, TierDef};

/// Tranches per default tier.
pub const DEFAULT_TRANCHES: u32 = 10;
/// Cost of the first default tier, FLOP·days.
pub const FIRST_TIER_COST: f64 = 1.0e21;
/// Each default tier costs this much more than the previous one.
pub const TIER_COST_GROWTH: f64 = 150.0;

pub fn default_buildings() -> Vec<BuildingDef> {
    let mut power_station = BuildingDef::new("power_station", BuildingCategory::Energy);
    power_station.name = "Power Station".to_string();
    power_station.mass_multiplier = 1.0;
    power_station.power_output_mw = 100.0;
    power_station.geometric_scaling_exponent = 1.05;

    let mut solar_array = BuildingDef::new("solar_array", BuildingCategory::Energy);
    solar_array.name = "Solar Array".to_string();
    solar_array.mass_multiplier = 0.5;
    solar_array.power_output_mw = 40.0;
    solar_array.allowed_orbital_zones = ["mercury", "venus", "earth", "mars"].map(ZoneId::from).to_vec();

    let mut mining_station = BuildingDef::new("mining_station", BuildingCategory::Mining);
    mining_station.name = "Mining Station".to_string();
    mining_station.mass_multiplier = 2.0;
    mining_station.mining_rate_multiplier = 0.5;
    mining_station.energy_cost_multiplier = 1.0;
    mining_station.geometric_scaling_exponent = 1.1;

    let mut refinery = BuildingDef::new("refinery", BuildingCategory::Refining);
    refinery.name = "Refinery".to_string();
    refinery.mass_multiplier = 1.5;
    refinery.extraction_bonus = 0.1;
    refinery.methalox_kg_per_day = 1_000.0;
    refinery.energy_cost_multiplier = 2.0;
    refinery.max_per_zone = Some(10);

    let mut factory = BuildingDef::new("factory", BuildingCategory::Production);
    factory.name = "Factory".to_string();
    factory.mass_multiplier = 2.0;
    factory.build_rate_multiplier = 0.5;
    factory.energy_cost_multiplier = 1.5;
    factory.geometric_scaling_exponent = 1.1;

    let mut data_center = BuildingDef::new("data_center", BuildingCategory::Compute);
    data_center.name = "Data Center".to_string();
    data_center.mass_multiplier = 3.0;
    data_center.compute_eflops = 1.0;
    data_center.energy_cost_multiplier = 4.0;

    let mut mass_driver = BuildingDef::new("mass_driver", BuildingCategory::Logistics);
    mass_driver.name = "Mass Driver".to_string();
    mass_driver.mass_multiplier = 5.0;
    mass_driver.mass_driver_capacity_kg_per_day = 1.0e6;
    mass_driver.energy_cost_multiplier = 2.0;
    mass_driver.max_per_zone = Some(5);

    let mut battery_bank = BuildingDef::new("battery_bank", BuildingCategory::Storage);
    battery_bank.name = "Battery Bank".to_string();
    battery_bank.mass_multiplier = 1.0;
    battery_bank.energy_storage_wd = 1.0e9;
    battery_bank.geometric_scaling_exponent = 1.05;

    vec![
        power_station,
        solar_array,
        mining_station,
        refinery,
        factory,
        data_center,
        mass_driver,
        battery_bank,
    ]
}

const TREES: &[(&str, &str, ResearchCategory)] = &[
    ("propulsion", "Propulsion Systems", ResearchCategory::Dexterity),
    ("locomotion", "Locomotion Systems", ResearchCategory::Dexterity),
    ("robotic", "Robotic Systems", ResearchCategory::Dexterity),
    ("production", "Production Efficiency", ResearchCategory::Dexterity),
    ("recycling", "Recycling Efficiency", ResearchCategory::Dexterity),
    ("materials_science", "Materials Science", ResearchCategory::Dexterity),
    ("dyson_construction", "Dyson Swarm Construction", ResearchCategory::Dexterity),
    ("energy_collection", "Energy Collection", ResearchCategory::Energy),
    ("energy_conversion", "Energy Conversion", ResearchCategory::Energy),
    ("energy_storage", "Energy Storage", ResearchCategory::Energy),
    ("energy_transport", "Energy Transport", ResearchCategory::Energy),
    ("thermal_management", "Thermal Management", ResearchCategory::Energy),
    ("computer_processing", "Processing", ResearchCategory::Intelligence),
    ("computer_gpu", "GPU", ResearchCategory::Intelligence),
    ("computer_interconnect", "Interconnect", ResearchCategory::Intelligence),
    ("computer_interface", "Interface", ResearchCategory::Intelligence),
    ("research_rate", "Research Methods", ResearchCategory::Intelligence),
    ("machine_learning", "Machine Learning", ResearchCategory::Intelligence),
];

/// One tree per skill, each with three tiers that raise that skill.
pub fn default_research_trees() -> Vec<ResearchTreeDef> {
    TREES
        .iter()
        .map(|&(id, name, category)| ResearchTreeDef {
            id: TreeId::from(id),
            name: name.to_string(),
            category,
            tiers: (0..3)
                .map(|i| TierDef {
                    id: TierId::new(format!("{id}_{}", i + 1)),
                    name: format!("{name} {}", i + 1),
                    tranches: DEFAULT_TRANCHES,
                    tranche_cost_intelligence: FIRST_TIER_COST * TIER_COST_GROWTH.powi(i)
                        / DEFAULT_TRANCHES as f64,
                    effects: BTreeMap::from([(id.to_string(), 0.5)]),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brachisto_core::skills::SkillName;
    use brachisto_tech_tree::TechTree;

    #[test]
    fn default_trees_register_and_name_real_skills() {
        let trees = default_research_trees();
        for tree in &trees {
            for tier in &tree.tiers {
                for skill in tier.effects.keys() {
                    assert!(skill.parse::<SkillName>().is_ok(), "{skill}");
                }
            }
        }
        assert!(TechTree::with_trees(trees).is_ok());
    }

    #[test]
    fn default_tier_costs_grow() {
        let trees = default_research_trees();
        let tiers = &trees[0].tiers;
        assert_eq!(tiers[0].total_cost(), FIRST_TIER_COST);
        assert!((tiers[1].total_cost() / tiers[0].total_cost() - TIER_COST_GROWTH).abs() < 1e-9);
    }

    #[test]
    fn default_buildings_are_unique() {
        let buildings = default_buildings();
        let mut ids: Vec<_> = buildings.iter().map(|b| b.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), buildings.len());
    }
}

//! The loading pipeline: files → definitions → frozen registry.

use std::path::Path;

use brachisto_core::orbital::{OrbitalMechanics, ZoneDef};
use brachisto_core::registry::{BuildingDef, Registry, RegistryBuilder};
use brachisto_core::rules::EconomicRules;
use brachisto_tech_tree::{ResearchTreeDef, TechTree};
use serde::de::DeserializeOwned;

use crate::defaults::{default_buildings, default_research_trees};
use crate::loader::{DataLoadError, deserialize_file, deserialize_list, find_data_file};

/// All static data the engine needs.
#[derive(Debug, Clone)]
pub struct GameData {
    pub registry: Registry,
    pub research_trees: Vec<ResearchTreeDef>,
}

impl GameData {
    /// Built-in solar system, buildings, research trees and rules.
    pub fn builtin() -> Self {
        let mut builder = RegistryBuilder::new();
        builder.orbital(OrbitalMechanics::default_solar_system());
        // Built-in buildings have unique ids.
        for def in default_buildings() {
            let _ = builder.register_building(def);
        }
        Self {
            registry: builder.build(),
            research_trees: default_research_trees(),
        }
    }

    /// A tech tree with every research tree registered.
    pub fn tech_tree(&self) -> Result<TechTree, DataLoadError> {
        Ok(TechTree::with_trees(self.research_trees.iter().cloned())?)
    }
}

fn load_list_or<T: DeserializeOwned>(
    dir: &Path,
    base_name: &str,
    toml_key: &str,
    fallback: impl FnOnce() -> Vec<T>,
) -> Result<Vec<T>, DataLoadError> {
    match find_data_file(dir, base_name)? {
        Some(path) => deserialize_list(&path, toml_key),
        None => {
            tracing::warn!(file = base_name, dir = %dir.display(), "data file missing, using built-in defaults");
            Ok(fallback())
        }
    }
}

/// Load every data file in `dir`. Missing files fall back to the built-in
/// defaults; malformed files are errors.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let zones: Vec<ZoneDef> = load_list_or(dir, "orbital_mechanics", "zones", || {
        OrbitalMechanics::default_solar_system().zones().cloned().collect()
    })?;
    let buildings: Vec<BuildingDef> = load_list_or(dir, "buildings", "buildings", default_buildings)?;
    let research_trees: Vec<ResearchTreeDef> =
        load_list_or(dir, "research_trees", "trees", default_research_trees)?;
    let rules: EconomicRules = match find_data_file(dir, "economic_rules")? {
        Some(path) => deserialize_file(&path)?,
        None => {
            tracing::warn!(file = "economic_rules", "data file missing, using built-in defaults");
            EconomicRules::default()
        }
    };

    let mut builder = RegistryBuilder::new();
    for zone in zones {
        builder.register_zone(zone)?;
    }
    for def in buildings {
        builder.register_building(def)?;
    }
    builder.rules(rules);

    // Validate the trees now rather than when the engine starts.
    TechTree::with_trees(research_trees.iter().cloned())?;

    tracing::info!(dir = %dir.display(), trees = research_trees.len(), "static data loaded");
    Ok(GameData {
        registry: builder.build(),
        research_trees,
    })
}

/// Like [`load_game_data`], but any error is logged and the built-in data
/// is used instead.
pub fn load_game_data_or_default(dir: &Path) -> GameData {
    load_game_data(dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "static data failed to load, using built-in defaults");
        GameData::builtin()
    })
}

//! Engine configuration: how a new game starts and how the clock runs.
//!
//! Loaded from an `engine.ron|toml|json` file next to the static data.
//! Every field has a default, so a missing file or a partial one is fine.

use std::collections::BTreeMap;
use std::path::Path;

use brachisto_core::id::{BuildingId, ZoneId};
use brachisto_core::state::ProbeAllocations;
use brachisto_core::time::{InvalidTimeSpeed, TimeSpeed};
use brachisto_data::{DataLoadError, deserialize_file, find_data_file};
use brachisto_stats::StatsConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] DataLoadError),
    #[error("invalid engine config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    TimeSpeed(#[from] InvalidTimeSpeed),
}

/// Multipliers applied to skill groups on top of research, every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingBonuses {
    pub compute: f64,
    pub energy: f64,
    pub dexterity: f64,
}

impl Default for StartingBonuses {
    fn default() -> Self {
        Self {
            compute: 1.0,
            energy: 1.0,
            dexterity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub days_per_tick: f64,
    /// One of 1, 2, 4, 10 or 100.
    pub initial_speed: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            days_per_tick: 1.0 / 60.0,
            initial_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_probes: f64,
    pub default_zone: ZoneId,
    /// Metal placed in the default zone at start, kg.
    pub initial_metal_kg: f64,
    /// Structures already standing in the default zone.
    pub initial_structures: BTreeMap<BuildingId, u32>,
    pub initial_allocations: ProbeAllocations,
    pub starting_bonuses: StartingBonuses,
    pub time: TimeConfig,
    pub stats: StatsConfig,
    /// Percentage of Dyson output routed to compute, 0 to 100.
    pub dyson_power_allocation: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_probes: 1.0,
            default_zone: ZoneId::from("earth"),
            initial_metal_kg: 0.0,
            initial_structures: BTreeMap::new(),
            initial_allocations: ProbeAllocations {
                harvest: 1.0,
                ..ProbeAllocations::idle()
            },
            starting_bonuses: StartingBonuses::default(),
            time: TimeConfig::default(),
            stats: StatsConfig::default(),
            dyson_power_allocation: 50.0,
        }
    }
}

impl EngineConfig {
    /// Load `engine.*` from `dir`, or the defaults when there is none.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config = match find_data_file(dir, "engine")? {
            Some(path) => deserialize_file::<EngineConfig>(&path)?,
            None => {
                tracing::warn!(dir = %dir.display(), "no engine config, using defaults");
                EngineConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn time_speed(&self) -> Result<TimeSpeed, ConfigError> {
        Ok(TimeSpeed::try_from(self.time.initial_speed)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };
        if !(self.initial_probes.is_finite() && self.initial_probes >= 0.0) {
            return Err(invalid("initial_probes", "must be a non-negative number"));
        }
        if !(self.initial_metal_kg.is_finite() && self.initial_metal_kg >= 0.0) {
            return Err(invalid("initial_metal_kg", "must be a non-negative number"));
        }
        if !self.initial_allocations.is_valid() {
            return Err(invalid("initial_allocations", "must each be in [0, 1]"));
        }
        let bonuses = self.starting_bonuses;
        if [bonuses.compute, bonuses.energy, bonuses.dexterity]
            .iter()
            .any(|b| !(b.is_finite() && *b > 0.0))
        {
            return Err(invalid("starting_bonuses", "must be positive"));
        }
        if !(self.time.days_per_tick.is_finite() && self.time.days_per_tick > 0.0) {
            return Err(invalid("time.days_per_tick", "must be positive"));
        }
        if !(0.0..=100.0).contains(&self.dyson_power_allocation) {
            return Err(invalid("dyson_power_allocation", "must be in [0, 100]"));
        }
        self.time_speed()?;
        Ok(())
    }
}

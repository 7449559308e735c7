//! Typed skill record and skill composition.
//!
//! # Overview
//!
//! Research exports skills as a flat `name -> multiplier` map whose names
//! come from data files and include historical aliases
//! (`robotic_systems`, `production_efficiency`, `computer_gpu`, ...).
//! [`SkillsCalculator`] resolves those names once per tick into a fixed
//! [`Skills`] record indexed by [`SkillName`]. Every calculator downstream
//! reads the typed record and never does string lookups.
//!
//! [`CompositeSkillsCalculator`] derives the aggregate skills (compute,
//! energy, dexterity) used by fleet scaling and for display.
//!
//! A skill value is a multiplier with baseline `1.0`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};

use crate::numeric::finite_or_zero;

// ---------------------------------------------------------------------------
// Skill names
// ---------------------------------------------------------------------------

/// Every skill the economy reads. Aliases are the research-tree ids used by
/// older data files and resolve to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillName {
    #[serde(alias = "propulsion_systems")]
    Propulsion,
    #[serde(alias = "thrust_systems")]
    Thrust,
    #[serde(alias = "locomotion_systems")]
    Locomotion,
    Acds,
    #[serde(alias = "robotic_systems", alias = "robotics")]
    Robotic,
    #[serde(alias = "production_efficiency")]
    Production,
    #[serde(alias = "recycling_efficiency")]
    Recycling,
    MaterialsScience,
    #[serde(alias = "dyson_swarm_construction")]
    DysonConstruction,
    EnergyCollection,
    EnergyConversion,
    EnergyStorage,
    EnergyTransport,
    SolarConcentrators,
    #[serde(alias = "heat_pump_systems")]
    ThermalManagement,
    #[serde(alias = "cpu")]
    ComputerProcessing,
    #[serde(alias = "gpu")]
    ComputerGpu,
    #[serde(alias = "interconnect")]
    ComputerInterconnect,
    #[serde(alias = "io_bandwidth")]
    ComputerInterface,
    #[serde(alias = "research_rate_efficiency")]
    ResearchRate,
    MachineLearning,
    #[serde(alias = "sensor_systems")]
    Sensors,
}

impl SkillName {
    pub const COUNT: usize = 22;

    pub const ALL: [SkillName; Self::COUNT] = [
        SkillName::Propulsion,
        SkillName::Thrust,
        SkillName::Locomotion,
        SkillName::Acds,
        SkillName::Robotic,
        SkillName::Production,
        SkillName::Recycling,
        SkillName::MaterialsScience,
        SkillName::DysonConstruction,
        SkillName::EnergyCollection,
        SkillName::EnergyConversion,
        SkillName::EnergyStorage,
        SkillName::EnergyTransport,
        SkillName::SolarConcentrators,
        SkillName::ThermalManagement,
        SkillName::ComputerProcessing,
        SkillName::ComputerGpu,
        SkillName::ComputerInterconnect,
        SkillName::ComputerInterface,
        SkillName::ResearchRate,
        SkillName::MachineLearning,
        SkillName::Sensors,
    ];

    /// Skills averaged into the compute composite (geometric mean).
    pub const COMPUTE: [SkillName; 4] = [
        SkillName::ComputerProcessing,
        SkillName::ComputerGpu,
        SkillName::ComputerInterconnect,
        SkillName::ComputerInterface,
    ];

    pub const ENERGY: [SkillName; 6] = [
        SkillName::EnergyCollection,
        SkillName::EnergyConversion,
        SkillName::EnergyStorage,
        SkillName::EnergyTransport,
        SkillName::SolarConcentrators,
        SkillName::ThermalManagement,
    ];

    pub const DEXTERITY: [SkillName; 9] = [
        SkillName::Propulsion,
        SkillName::Thrust,
        SkillName::Locomotion,
        SkillName::Acds,
        SkillName::Robotic,
        SkillName::Production,
        SkillName::Recycling,
        SkillName::MaterialsScience,
        SkillName::DysonConstruction,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A skill name that matched no variant or alias.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown skill '{0}'")]
pub struct UnknownSkill(pub String);

/// A skill multiplier that is not finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid value {value} for skill {skill}")]
pub struct InvalidSkillValue {
    pub skill: SkillName,
    pub value: f64,
}

impl FromStr for SkillName {
    type Err = UnknownSkill;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let de: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
            s.into_deserializer();
        SkillName::deserialize(de).map_err(|_| UnknownSkill(s.to_string()))
    }
}

impl fmt::Display for SkillName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Skills record
// ---------------------------------------------------------------------------

/// One multiplier per [`SkillName`], baseline `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Skills {
    values: [f64; SkillName::COUNT],
}

impl Default for Skills {
    fn default() -> Self {
        Self::baseline()
    }
}

impl Skills {
    /// All skills at `1.0`.
    pub fn baseline() -> Self {
        Self {
            values: [1.0; SkillName::COUNT],
        }
    }

    #[inline]
    pub fn get(&self, skill: SkillName) -> f64 {
        self.values[skill.index()]
    }

    /// Set a skill, leaving it unchanged unless `value` is finite and
    /// positive.
    pub fn try_set(&mut self, skill: SkillName, value: f64) -> Result<(), InvalidSkillValue> {
        if !(value.is_finite() && value > 0.0) {
            return Err(InvalidSkillValue { skill, value });
        }
        self.values[skill.index()] = value;
        Ok(())
    }

    /// Set a skill. Rejected values fall back to baseline with a warning.
    pub fn set(&mut self, skill: SkillName, value: f64) {
        if let Err(e) = self.try_set(skill, value) {
            tracing::warn!("{e}, using baseline");
            self.values[skill.index()] = 1.0;
        }
    }

    pub fn with(mut self, skill: SkillName, value: f64) -> Self {
        self.set(skill, value);
        self
    }

    /// Multiply a group of skills by `factor`.
    pub fn scale(&mut self, skills: &[SkillName], factor: f64) {
        for &skill in skills {
            let v = self.get(skill) * factor;
            self.set(skill, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkillName, f64)> + '_ {
        SkillName::ALL.iter().map(move |&s| (s, self.get(s)))
    }
}

// ---------------------------------------------------------------------------
// Skill weights
// ---------------------------------------------------------------------------

/// A weighting formula: `factor = 1 + Σ weight_i·(skill_i − 1)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillWeights(pub BTreeMap<SkillName, f64>);

impl SkillWeights {
    pub fn new(weights: &[(SkillName, f64)]) -> Self {
        Self(weights.iter().copied().collect())
    }

    /// Raw weighted factor, unclamped. Baseline skills give exactly `1.0`.
    pub fn factor(&self, skills: &Skills) -> f64 {
        let sum: f64 = self
            .0
            .iter()
            .map(|(&skill, &weight)| weight * (skills.get(skill) - 1.0))
            .sum();
        finite_or_zero(1.0 + sum)
    }

    /// Weighted factor clamped to at least `floor`, for use as a divisor.
    pub fn reduction_factor(&self, skills: &Skills, floor: f64) -> f64 {
        self.factor(skills).max(floor)
    }
}

// ---------------------------------------------------------------------------
// SkillsCalculator
// ---------------------------------------------------------------------------

/// Resolves a flat exported skill map into the typed record.
pub struct SkillsCalculator;

impl SkillsCalculator {
    /// Build [`Skills`] from `name -> multiplier`. When two names resolve to
    /// the same skill their bonuses stack multiplicatively. Unknown names are
    /// logged and skipped.
    pub fn from_legacy(map: &BTreeMap<String, f64>) -> Skills {
        let mut skills = Skills::baseline();
        for (name, &value) in map {
            match name.parse::<SkillName>() {
                Ok(skill) => {
                    let current = skills.get(skill);
                    skills.set(skill, current * value);
                }
                Err(e) => tracing::warn!("ignoring research skill: {e}"),
            }
        }
        skills
    }
}

// ---------------------------------------------------------------------------
// CompositeSkillsCalculator
// ---------------------------------------------------------------------------

/// Aggregate skills derived from the typed record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeSkills {
    /// Geometric mean of processing, GPU, interconnect and interface.
    pub compute: f64,
    /// Arithmetic mean of the energy skills.
    pub energy: f64,
    /// Arithmetic mean of the dexterity skills.
    pub dexterity: f64,
}

impl Default for CompositeSkills {
    fn default() -> Self {
        Self {
            compute: 1.0,
            energy: 1.0,
            dexterity: 1.0,
        }
    }
}

pub struct CompositeSkillsCalculator;

impl CompositeSkillsCalculator {
    pub fn calculate(skills: &Skills) -> CompositeSkills {
        CompositeSkills {
            compute: Self::geometric_mean(skills, &SkillName::COMPUTE),
            energy: Self::mean(skills, &SkillName::ENERGY),
            dexterity: Self::mean(skills, &SkillName::DEXTERITY),
        }
    }

    fn geometric_mean(skills: &Skills, names: &[SkillName]) -> f64 {
        let log_sum: f64 = names.iter().map(|&s| skills.get(s).ln()).sum();
        let v = (log_sum / names.len() as f64).exp();
        if v.is_finite() && v > 0.0 { v } else { 1.0 }
    }

    fn mean(skills: &Skills, names: &[SkillName]) -> f64 {
        let sum: f64 = names.iter().map(|&s| skills.get(s)).sum();
        sum / names.len() as f64
    }
}

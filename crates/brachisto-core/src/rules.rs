//! Economic rules: every tunable constant of the economy.
//!
//! Loaded from `economic_rules.{ron,toml,json}`. Every field has a default,
//! so a partial file overrides only what it names and a missing file yields
//! [`EconomicRules::default`].

use serde::{Deserialize, Serialize};

use crate::skills::{SkillName, SkillWeights};

/// Standard gravity, m/s².
pub const G0: f64 = 9.80665;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicRules {
    pub probe: ProbeRules,
    pub structures: StructureRules,
    pub energy: EnergyRules,
    pub skill_coefficients: SkillCoefficients,
    pub alpha_factors: AlphaFactors,
    pub crowding: CrowdingRules,
    pub fleet_scaling: FleetScalingRules,
    pub replication_scaling: ReplicationScalingRules,
    pub recycling: RecyclingRules,
    pub dyson: DysonRules,
    pub compute: ComputeRules,
    pub research: ResearchRules,
    pub propulsion: PropulsionRules,
    pub time: TimeRules,
    /// Lowest value a weighted reduction factor may take before it is used
    /// as a divisor.
    pub reduction_factor_floor: f64,
}

impl Default for EconomicRules {
    fn default() -> Self {
        Self {
            probe: ProbeRules::default(),
            structures: StructureRules::default(),
            energy: EnergyRules::default(),
            skill_coefficients: SkillCoefficients::default(),
            alpha_factors: AlphaFactors::default(),
            crowding: CrowdingRules::default(),
            fleet_scaling: FleetScalingRules::default(),
            replication_scaling: ReplicationScalingRules::default(),
            recycling: RecyclingRules::default(),
            dyson: DysonRules::default(),
            compute: ComputeRules::default(),
            research: ResearchRules::default(),
            propulsion: PropulsionRules::default(),
            time: TimeRules::default(),
            reduction_factor_floor: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// Probes and structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeRules {
    pub mass_kg: f64,
    pub base_mining_rate_kg_per_day: f64,
    pub base_build_rate_kg_per_day: f64,
    pub base_energy_production_w: f64,
    pub mining_energy_cost_w: f64,
    pub build_energy_cost_w: f64,
    pub recycle_energy_cost_w: f64,
    pub dyson_energy_cost_w: f64,
}

impl Default for ProbeRules {
    fn default() -> Self {
        Self {
            mass_kg: 100.0,
            base_mining_rate_kg_per_day: 100.0,
            base_build_rate_kg_per_day: 20.0,
            base_energy_production_w: 100_000.0,
            mining_energy_cost_w: 500_000.0,
            build_energy_cost_w: 250_000.0,
            recycle_energy_cost_w: 300_000.0,
            dyson_energy_cost_w: 250_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureRules {
    /// Mass of a building whose definition gives only a multiplier.
    pub base_mass_kg: f64,
    /// Upkeep of a building with `energy_cost_multiplier == 1`.
    pub base_energy_cost_w: f64,
}

impl Default for StructureRules {
    fn default() -> Self {
        Self {
            base_mass_kg: 100_000.0,
            base_energy_cost_w: 250_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyRules {
    /// Supply available with no probes or structures at all.
    pub base_supply_w: f64,
}

impl Default for EnergyRules {
    fn default() -> Self {
        Self {
            base_supply_w: 100_000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Skill coefficients and alpha factors
// ---------------------------------------------------------------------------

/// Weight tables for every skill-weighted formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillCoefficients {
    pub mining: SkillWeights,
    pub building: SkillWeights,
    pub energy: SkillWeights,
    pub compute: SkillWeights,
    pub dyson_construction: SkillWeights,
    pub mining_energy_cost: SkillWeights,
    pub building_energy_cost: SkillWeights,
    pub energy_upkeep_cost: SkillWeights,
    pub compute_energy_cost: SkillWeights,
    pub extraction: SkillWeights,
    pub recycling_speed: SkillWeights,
    pub recycling_efficiency: SkillWeights,
    pub propulsion: SkillWeights,
    pub research_rate: SkillWeights,
    /// Multiplies the capacity of storage structures.
    pub energy_storage: SkillWeights,
}

impl Default for SkillCoefficients {
    fn default() -> Self {
        use SkillName::*;
        Self {
            mining: SkillWeights::new(&[(Locomotion, 0.4), (Robotic, 0.3), (Acds, 0.3)]),
            building: SkillWeights::new(&[(Robotic, 0.5), (Production, 0.3), (MaterialsScience, 0.2)]),
            energy: SkillWeights::new(&[
                (EnergyCollection, 0.5),
                (EnergyConversion, 0.3),
                (SolarConcentrators, 0.2),
            ]),
            compute: SkillWeights::new(&[
                (ComputerProcessing, 0.25),
                (ComputerGpu, 0.25),
                (ComputerInterconnect, 0.25),
                (ComputerInterface, 0.25),
            ]),
            dyson_construction: SkillWeights::new(&[
                (DysonConstruction, 0.6),
                (Robotic, 0.2),
                (MaterialsScience, 0.2),
            ]),
            mining_energy_cost: SkillWeights::new(&[(EnergyConversion, 0.5), (Locomotion, 0.5)]),
            building_energy_cost: SkillWeights::new(&[(Production, 0.5), (EnergyConversion, 0.5)]),
            energy_upkeep_cost: SkillWeights::new(&[(ThermalManagement, 0.5), (EnergyTransport, 0.5)]),
            compute_energy_cost: SkillWeights::new(&[(ThermalManagement, 0.5), (ComputerProcessing, 0.5)]),
            extraction: SkillWeights::new(&[(Production, 0.5), (MaterialsScience, 0.5)]),
            recycling_speed: SkillWeights::new(&[(Recycling, 0.5), (Robotic, 0.5)]),
            recycling_efficiency: SkillWeights::new(&[(Recycling, 1.0)]),
            propulsion: SkillWeights::new(&[(Propulsion, 0.7), (Thrust, 0.3)]),
            research_rate: SkillWeights::new(&[(ResearchRate, 0.5), (MachineLearning, 0.5)]),
            energy_storage: SkillWeights::new(&[(EnergyStorage, 1.0)]),
        }
    }
}

/// Exponents turning a weighted factor into `{performance, cost}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaPair {
    pub performance: f64,
    pub cost: f64,
}

impl Default for AlphaPair {
    fn default() -> Self {
        Self {
            performance: 1.0,
            cost: 1.0,
        }
    }
}

/// Per-activity exponents for one class of producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaSet {
    pub mining: AlphaPair,
    pub building: AlphaPair,
    pub energy: AlphaPair,
    pub compute: AlphaPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaFactors {
    pub probe: AlphaSet,
    pub structure: AlphaSet,
    pub dyson: AlphaSet,
}

impl Default for AlphaFactors {
    fn default() -> Self {
        let compute_heavy = AlphaSet {
            compute: AlphaPair {
                performance: 1.2,
                cost: 1.0,
            },
            ..AlphaSet::default()
        };
        Self {
            probe: AlphaSet::default(),
            structure: compute_heavy,
            dyson: compute_heavy,
        }
    }
}

// ---------------------------------------------------------------------------
// Throughput penalties
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdingRules {
    /// Probe-mass fraction of zone mass below which crowding is inactive.
    pub onset_ratio: f64,
    pub exponent: f64,
}

impl Default for CrowdingRules {
    fn default() -> Self {
        Self {
            onset_ratio: 0.05,
            exponent: 2.0,
        }
    }
}

/// Per-zone fleet-size penalty: efficiency falls by a fixed fraction each
/// time the zone's probe count doubles past `onset_probes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetScalingRules {
    pub onset_probes: f64,
    pub base_penalty_per_doubling: f64,
    pub min_penalty_per_doubling: f64,
    /// Compute composite at which the penalty reaches its minimum.
    pub compute_skill_threshold: f64,
    pub min_efficiency: f64,
}

impl Default for FleetScalingRules {
    fn default() -> Self {
        Self {
            onset_probes: 1_000.0,
            base_penalty_per_doubling: 0.05,
            min_penalty_per_doubling: 0.01,
            compute_skill_threshold: 3.18,
            min_efficiency: 0.001,
        }
    }
}

/// Global replication slowdown once the whole fleet is enormous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationScalingRules {
    pub threshold_probes: f64,
    /// Multiplier per 10x growth past the threshold.
    pub halving_factor: f64,
    pub min_efficiency: f64,
}

impl Default for ReplicationScalingRules {
    fn default() -> Self {
        Self {
            threshold_probes: 1e12,
            halving_factor: 0.5,
            min_efficiency: 0.0001,
        }
    }
}

// ---------------------------------------------------------------------------
// Recycling, Dyson, compute, research, propulsion, time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecyclingRules {
    pub base_rate_kg_per_day: f64,
    pub base_efficiency: f64,
    pub max_efficiency: f64,
    /// Fraction of recycle-allocated probes dismantled per day.
    pub probe_dismantle_fraction_per_day: f64,
    /// Width of the linear ramp above the target probe-mass ratio.
    pub probe_ramp_band: f64,
}

impl Default for RecyclingRules {
    fn default() -> Self {
        Self {
            base_rate_kg_per_day: 50.0,
            base_efficiency: 0.75,
            max_efficiency: 0.98,
            probe_dismantle_fraction_per_day: 0.01,
            probe_ramp_band: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DysonRules {
    pub target_mass_kg: f64,
    pub mass_per_m2_kg: f64,
    pub power_per_m2_w: f64,
    /// Target mass reduction per point of Dyson-construction bonus.
    pub mass_reduction_per_bonus: f64,
    pub max_mass_reduction: f64,
}

impl Default for DysonRules {
    fn default() -> Self {
        Self {
            target_mass_kg: 2e23,
            mass_per_m2_kg: 1.0,
            power_per_m2_w: 5_000.0,
            mass_reduction_per_bonus: 0.1,
            max_mass_reduction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeRules {
    /// Onboard compute available with nothing built.
    pub base_flops: f64,
    pub flops_per_watt: f64,
}

impl Default for ComputeRules {
    fn default() -> Self {
        Self {
            base_flops: 1e15,
            flops_per_watt: 1e9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchRules {
    /// Multiplier applied to the bonus of tier `i` as `decay^i`.
    pub tier_bonus_decay: f64,
}

impl Default for ResearchRules {
    fn default() -> Self {
        Self {
            tier_bonus_decay: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropulsionRules {
    pub base_isp_s: f64,
    /// Wet-to-dry mass ratio used for the rocket equation.
    pub probe_mass_ratio: f64,
}

impl Default for PropulsionRules {
    fn default() -> Self {
        Self {
            base_isp_s: 500.0,
            probe_mass_ratio: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeRules {
    pub seconds_per_day: f64,
}

impl Default for TimeRules {
    fn default() -> Self {
        Self {
            seconds_per_day: 86_400.0,
        }
    }
}

//! Static orbital zone data and transfer geometry.
//!
//! Zones are circular heliocentric orbits. Transfers between them are
//! priced as Hohmann transfers around the Sun plus the escape Δv of the
//! origin body.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::id::ZoneId;

/// Standard gravitational parameter of the Sun, m³/s².
pub const MU_SUN: f64 = 1.327_124_400_18e20;
/// One astronomical unit in metres.
pub const AU_M: f64 = 1.495_978_707e11;

// ---------------------------------------------------------------------------
// Zone definitions
// ---------------------------------------------------------------------------

/// Static description of an orbital zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDef {
    pub id: ZoneId,
    #[serde(default)]
    pub name: String,
    pub radius_au: f64,
    /// Minable mass at game start.
    #[serde(default)]
    pub total_mass_kg: f64,
    /// Fraction of mined mass that is recoverable metal, in `[0, 1]`.
    #[serde(default)]
    pub metal_percentage: f64,
    #[serde(default)]
    pub is_dyson_zone: bool,
    /// Δv to climb out of the zone's parking orbit, added to every departure.
    #[serde(default)]
    pub escape_delta_v_km_s: f64,
}

impl ZoneDef {
    pub fn new(id: &str, radius_au: f64, total_mass_kg: f64, metal_percentage: f64) -> Self {
        Self {
            id: ZoneId::from(id),
            name: id.to_string(),
            radius_au,
            total_mass_kg,
            metal_percentage,
            is_dyson_zone: false,
            escape_delta_v_km_s: 0.0,
        }
    }

    pub fn dyson(id: &str, radius_au: f64) -> Self {
        Self {
            is_dyson_zone: true,
            ..Self::new(id, radius_au, 0.0, 0.0)
        }
    }

    pub fn with_escape_delta_v(mut self, km_s: f64) -> Self {
        self.escape_delta_v_km_s = km_s;
        self
    }
}

// ---------------------------------------------------------------------------
// OrbitalMechanics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrbitalMechanics {
    zones: BTreeMap<ZoneId, ZoneDef>,
    dyson_zone: Option<ZoneId>,
}

impl OrbitalMechanics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, zone: ZoneDef) {
        if zone.is_dyson_zone {
            self.dyson_zone = Some(zone.id.clone());
        }
        self.zones.insert(zone.id.clone(), zone);
    }

    pub fn contains(&self, id: &ZoneId) -> bool {
        self.zones.contains_key(id)
    }

    pub fn zone(&self, id: &ZoneId) -> Option<&ZoneDef> {
        self.zones.get(id)
    }

    pub fn zones(&self) -> impl Iterator<Item = &ZoneDef> {
        self.zones.values()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn dyson_zone(&self) -> Option<&ZoneId> {
        self.dyson_zone.as_ref()
    }

    pub fn is_dyson_zone(&self, id: &ZoneId) -> bool {
        self.dyson_zone.as_ref() == Some(id)
    }

    /// Distance between two zone orbits in AU.
    pub fn distance_au(&self, from: &ZoneId, to: &ZoneId) -> Option<f64> {
        let (a, b) = (self.zone(from)?, self.zone(to)?);
        Some((a.radius_au - b.radius_au).abs())
    }

    /// Total Hohmann Δv between the two orbits, km/s.
    pub fn hohmann_delta_v_km_s(&self, from: &ZoneId, to: &ZoneId) -> Option<f64> {
        let r1 = self.zone(from)?.radius_au * AU_M;
        let r2 = self.zone(to)?.radius_au * AU_M;
        if r1 <= 0.0 || r2 <= 0.0 {
            return None;
        }
        let v1 = (MU_SUN / r1).sqrt();
        let v2 = (MU_SUN / r2).sqrt();
        let burn1 = v1 * ((2.0 * r2 / (r1 + r2)).sqrt() - 1.0);
        let burn2 = v2 * (1.0 - (2.0 * r1 / (r1 + r2)).sqrt());
        Some((burn1.abs() + burn2.abs()) / 1000.0)
    }

    /// Δv a probe must carry to go from `from` to `to`, km/s.
    pub fn transfer_delta_v_km_s(&self, from: &ZoneId, to: &ZoneId) -> Option<f64> {
        let escape = self.zone(from)?.escape_delta_v_km_s;
        Some(self.hohmann_delta_v_km_s(from, to)? + escape)
    }

    /// Half-period of the Hohmann transfer ellipse, days.
    pub fn hohmann_transfer_days(&self, from: &ZoneId, to: &ZoneId, seconds_per_day: f64) -> Option<f64> {
        let r1 = self.zone(from)?.radius_au * AU_M;
        let r2 = self.zone(to)?.radius_au * AU_M;
        let a = (r1 + r2) / 2.0;
        if a <= 0.0 || seconds_per_day <= 0.0 {
            return None;
        }
        Some(PI * (a.powi(3) / MU_SUN).sqrt() / seconds_per_day)
    }

    /// Built-in zone table used when no orbital data file is present.
    pub fn default_solar_system() -> Self {
        let zones = [
            ZoneDef::dyson("dyson_sphere", 0.29),
            ZoneDef::new("mercury", 0.39, 3.3011e23, 0.7),
            ZoneDef::new("venus", 0.72, 4.8675e24, 0.3),
            ZoneDef::new("earth", 1.0, 5.9724e24, 0.32),
            ZoneDef::new("mars", 1.52, 6.4171e23, 0.25),
            ZoneDef::new("asteroid_belt", 2.7, 3.0e21, 0.2),
            ZoneDef::new("jupiter", 5.2, 1.8982e27, 0.01).with_escape_delta_v(17.0),
            ZoneDef::new("saturn", 9.5, 5.6834e26, 0.01).with_escape_delta_v(10.0),
            ZoneDef::new("uranus", 19.2, 8.6810e25, 0.02).with_escape_delta_v(6.0),
            ZoneDef::new("neptune", 30.1, 1.02413e26, 0.02).with_escape_delta_v(6.7),
            ZoneDef::new("kuiper", 40.0, 1.2e23, 0.05),
            ZoneDef::new("oort_cloud", 140.0, 1.0e25, 0.05),
        ];
        let mut orbital = Self::new();
        for zone in zones {
            orbital.insert(zone);
        }
        orbital
    }
}

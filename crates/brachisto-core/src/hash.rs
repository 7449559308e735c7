//! Deterministic state hashing for replay and desync checks.

use crate::state::GameState;

/// FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Hashes the bit pattern, so `0.0` and `-0.0` differ.
    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }

    /// Hash every simulated quantity of a game state. Collections are
    /// ordered maps, so iteration order is stable.
    pub fn of_state(state: &GameState) -> u64 {
        let mut h = Self::new();
        h.write_u64(state.tick);
        h.write_f64(state.time_days);

        for (id, zone) in &state.zones {
            h.write_str(id.as_str());
            for v in [
                zone.mass_remaining,
                zone.stored_metal,
                zone.probe_mass,
                zone.structure_mass,
                zone.slag_mass,
                zone.methalox,
            ] {
                h.write_f64(v);
            }
            h.write(&[zone.depleted as u8]);
        }
        for (zone, types) in &state.probes_by_zone {
            h.write_str(zone.as_str());
            for (ty, count) in types {
                h.write_str(ty.as_str());
                h.write_f64(*count);
            }
        }
        for (zone, buildings) in &state.structures_by_zone {
            h.write_str(zone.as_str());
            for (id, count) in buildings {
                h.write_str(id.as_str());
                h.write_u32(*count);
            }
        }
        for (key, progress) in &state.construction_progress {
            h.write_str(&key.to_string());
            h.write_f64(*progress);
        }
        for (tree, tiers) in &state.research {
            h.write_str(tree.as_str());
            for (tier, p) in tiers {
                h.write_str(tier.as_str());
                h.write_u32(p.tranches_completed);
                h.write_f64(p.progress);
                h.write(&[p.enabled as u8]);
            }
        }
        for transfer in state.transfers.values() {
            h.write_str(transfer.origin.as_str());
            h.write_str(transfer.destination.as_str());
            for shipment in &transfer.in_flight {
                h.write_f64(shipment.amount);
                h.write_f64(shipment.remaining_days);
            }
        }
        h.write_f64(state.energy_storage.stored_wd);
        h.write_f64(state.dyson.mass_kg);
        h.write_f64(state.intelligence_flops);
        h.finish()
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

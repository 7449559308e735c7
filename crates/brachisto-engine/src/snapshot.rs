//! Binary snapshots of a running game.
//!
//! A snapshot is a `bitcode` encoding of the state, clock, research
//! progress, statistics and engine config behind a versioned header. Static
//! data (zones, buildings, research trees) is not included; it is supplied
//! again when the snapshot is restored.

use brachisto_core::registry::Registry;
use brachisto_core::state::GameState;
use brachisto_core::time::TimeManager;
use brachisto_data::GameData;
use brachisto_power::EnergyCalculator;
use brachisto_stats::StatsTracker;
use brachisto_tech_tree::TechTree;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::GameEngine;

/// Magic number identifying an engine snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xB7AC_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("static data cannot restore this snapshot: {0}")]
    StaticData(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick at which the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Read the header of a snapshot. bitcode cannot decode a prefix, so this
/// decodes the whole snapshot.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: EngineSnapshot = bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    state: GameState,
    time: TimeManager,
    energy: EnergyCalculator,
    stats: StatsTracker,
    config: EngineConfig,
    last_state_hash: u64,
}

// ---------------------------------------------------------------------------
// GameEngine
// ---------------------------------------------------------------------------

impl GameEngine {
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(self.time.tick()),
            state: (*self.state).clone(),
            time: self.time.clone(),
            energy: self.energy.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
            last_state_hash: self.last_state_hash,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Restore a game saved with [`GameEngine::serialize`].
    pub fn deserialize(data: &[u8], game_data: &GameData) -> Result<Self, DeserializeError> {
        let tech_tree = game_data
            .tech_tree()
            .map_err(|e| DeserializeError::StaticData(e.to_string()))?;
        Self::deserialize_with(data, game_data.registry.clone(), tech_tree)
    }

    /// Restore a game against explicit static data. Research progress for
    /// trees or tiers the tech tree does not know is dropped.
    pub fn deserialize_with(data: &[u8], registry: Registry, mut tech_tree: TechTree) -> Result<Self, DeserializeError> {
        let snapshot: EngineSnapshot = bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        let EngineSnapshot {
            mut state,
            time,
            energy,
            stats,
            config,
            last_state_hash,
            ..
        } = snapshot;
        tech_tree.load_state(std::mem::take(&mut state.research));
        state.research = tech_tree.export_state();

        let mut engine = Self::assemble(registry, state, time, tech_tree, energy, stats, config);
        engine.last_state_hash = last_state_hash;
        tracing::info!(tick = engine.time.tick(), "snapshot restored");
        Ok(engine)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

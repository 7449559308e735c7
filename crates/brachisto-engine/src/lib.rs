//! Brachisto Engine -- the game loop of the space colonization economy.
//!
//! [`GameEngine`] owns the state, the research tree, the energy tracker and
//! the statistics, and advances them one tick at a time. Player input goes
//! through [`GameEngine::perform_action`] between ticks.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut engine = GameEngine::from_dir(Path::new("data"))?;
//! engine.perform_action_json(r#"{"type": "allocate_probes", "zone_id": "earth", "replicate": 0.5}"#);
//! for _ in 0..600 {
//!     let report = engine.tick();
//! }
//! let snapshot = engine.state();
//! ```
//!
//! # Key Types
//!
//! - [`GameEngine`] -- Tick pipeline and owner of all mutable state.
//! - [`Action`] -- Typed player actions, also accepted as flat JSON.
//! - [`EngineConfig`] -- How a new game starts.
//! - [`snapshot`] -- Versioned binary save format via bitcode.

pub mod actions;
pub mod config;
pub mod engine;
pub mod snapshot;

pub use actions::{ACTION_TYPES, Action, ActionError, ActionOutcome, parse_action};
pub use config::{ConfigError, EngineConfig, StartingBonuses, TimeConfig};
pub use engine::{GameEngine, TickReport};
pub use snapshot::{DeserializeError, SerializeError, SnapshotHeader, read_snapshot_header};

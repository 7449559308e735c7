//! Brachisto Core -- the economic simulation model of an idle space
//! colonization game.
//!
//! This crate holds the state, static data and every per-tick mutator of the
//! economy. Orchestration, energy, research trees, statistics and data
//! loading live in sibling crates that build on these types.
//!
//! # Zone Economy
//!
//! The solar system is split into orbital zones. Each zone holds raw mass,
//! stored metal, probes, structures, slag and methalox. Probes are split
//! across activities by fractional allocations:
//!
//! 1. **Harvest** -- mine raw mass into metal and slag.
//! 2. **Construct** -- invest metal into enabled structures.
//! 3. **Replicate** -- turn metal into more probes.
//! 4. **Recycle** -- reprocess slag, or dismantle surplus probes.
//! 5. **Dyson** -- lift metal into the sphere (Dyson zone only).
//!
//! # Key Types
//!
//! - [`state::GameState`] -- The single mutable state object.
//! - [`registry::Registry`] -- Immutable buildings, zones and economic rules
//!   (frozen at startup).
//! - [`skills::Skills`] -- Typed skill multipliers, baseline `1.0`.
//! - [`production::ProductionCalculator`] -- Upgrade factors, crowding, fleet
//!   scaling and throttles.
//! - [`context::TickContext`] -- Explicit per-tick inputs handed to each
//!   [`context::TickSystem`].
//! - [`transfer::TransferSystem`] -- Probe and metal logistics between zones.

pub mod context;
pub mod event;
pub mod hash;
pub mod id;
pub mod numeric;
pub mod orbital;
pub mod production;
pub mod recycling;
pub mod registry;
pub mod research;
pub mod rules;
pub mod skills;
pub mod state;
pub mod systems;
pub mod time;
pub mod transfer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

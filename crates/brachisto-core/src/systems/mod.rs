//! Per-tick zone, structure, probe and Dyson mutators.
//!
//! Each system implements [`TickSystem`](crate::context::TickSystem) and is
//! run by the orchestrator in a fixed order: mining, structures, probes,
//! Dyson. Construction, replication and Dyson building share the per-zone
//! metal throttle computed by
//! [`TickContext::plan_builds`](crate::context::TickContext::plan_builds),
//! which must run after mining and before any of them.

pub mod dyson;
pub mod mining;
pub mod probe;
pub mod structure;

pub use dyson::DysonSystem;
pub use mining::MiningSystem;
pub use probe::ProbeSystem;
pub use structure::StructureSystem;

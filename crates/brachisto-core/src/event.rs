//! Economy events emitted while a tick runs.
//!
//! Systems push events into the tick's [`TickLedger`](crate::context::TickLedger);
//! the orchestrator drains them once the tick completes and returns them in
//! its tick report.

use serde::{Deserialize, Serialize};

use crate::id::{BuildingId, TransferId, ZoneId};
use crate::transfer::TransferResource;

/// Why an enabled construction slot switched itself off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructionStop {
    TargetReached,
    ZoneLimitReached,
}

/// A notable change in the economy. All events carry the tick at which they
/// occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EconomyEvent {
    // -- Zones --
    ZoneDepleted {
        zone: ZoneId,
        tick: u64,
    },

    // -- Structures --
    StructureCompleted {
        zone: ZoneId,
        building: BuildingId,
        count: u32,
        tick: u64,
    },
    ConstructionStopped {
        zone: ZoneId,
        building: BuildingId,
        reason: ConstructionStop,
        tick: u64,
    },

    // -- Logistics --
    ShipmentDelivered {
        transfer: TransferId,
        destination: ZoneId,
        resource: TransferResource,
        amount: f64,
        tick: u64,
    },
}

impl EconomyEvent {
    pub fn tick(&self) -> u64 {
        match self {
            EconomyEvent::ZoneDepleted { tick, .. }
            | EconomyEvent::StructureCompleted { tick, .. }
            | EconomyEvent::ConstructionStopped { tick, .. }
            | EconomyEvent::ShipmentDelivered { tick, .. } => *tick,
        }
    }
}

//! Inter-zone logistics.
//!
//! # Overview
//!
//! A [`Transfer`] moves probes or metal from an origin zone to a destination
//! zone. Resources leave the origin when they are sent and travel as
//! [`Shipment`]s until their transit time elapses, when they are added to the
//! destination exactly once.
//!
//! - **One-time** transfers send their whole amount at creation. The
//!   transfer disappears once its shipment lands.
//! - **Continuous** transfers send every tick: a percentage of the origin's
//!   probe production this tick, or a percentage of its mass-driver capacity.
//!
//! Paused transfers are frozen: nothing is sent and in-flight shipments do
//! not advance. Deleting a transfer forfeits whatever is still in flight.
//!
//! # Reachability
//!
//! Probes fly themselves, so a probe transfer is only allowed when the
//! probe's delta-v budget (rocket equation on the skill-scaled Isp) covers
//! the Hohmann transfer plus the origin's escape delta-v. Metal is launched
//! by mass drivers and is not gated.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use slotmap::{Key, KeyData};

use crate::context::{TickContext, TickSystem};
use crate::event::EconomyEvent;
use crate::id::{TransferId, ZoneId};
use crate::numeric::{finite_or_zero, non_negative, safe_div};
use crate::production::ProductionCalculator;
use crate::registry::Registry;
use crate::rules::G0;
use crate::skills::Skills;
use crate::state::GameState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferResource {
    Probes,
    Metal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    OneTime,
    /// Percentage in `(0, 100]` of the origin's live output.
    Continuous { rate_percentage: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    /// Probe count or metal kg.
    pub amount: f64,
    pub remaining_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub origin: ZoneId,
    pub destination: ZoneId,
    pub resource: TransferResource,
    pub kind: TransferKind,
    pub transit_days: f64,
    pub paused: bool,
    pub in_flight: VecDeque<Shipment>,
    pub total_sent: f64,
    pub total_delivered: f64,
}

impl Transfer {
    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, TransferKind::Continuous { .. })
    }

    pub fn amount_in_flight(&self) -> f64 {
        self.in_flight.iter().map(|s| s.amount).sum()
    }
}

/// Parameters of a new transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub origin: ZoneId,
    pub destination: ZoneId,
    pub resource: TransferResource,
    pub kind: TransferRequestKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransferRequestKind {
    OneTime { amount: f64 },
    Continuous { rate_percentage: f64 },
}

/// Stable external handle for a transfer.
pub fn external_id(id: TransferId) -> u64 {
    id.data().as_ffi()
}

pub fn from_external_id(raw: u64) -> TransferId {
    TransferId::from(KeyData::from_ffi(raw))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransferError {
    #[error("unknown zone '{0}'")]
    UnknownZone(ZoneId),
    #[error("origin and destination are the same zone")]
    SameZone,
    #[error("transfer amount must be positive, got {0}")]
    InvalidAmount(f64),
    #[error("rate percentage must be in (0, 100], got {0}")]
    InvalidRate(f64),
    #[error("not enough probes in origin: have {have}, need {need}")]
    InsufficientProbes { have: f64, need: f64 },
    #[error("not enough metal in origin: have {have}, need {need}")]
    InsufficientMetal { have: f64, need: f64 },
    #[error("zone '{0}' has no mass driver")]
    NoMassDriver(ZoneId),
    #[error("insufficient delta-v: need {required_km_s:.2} km/s, probes have {capacity_km_s:.2} km/s")]
    InsufficientDeltaV { required_km_s: f64, capacity_km_s: f64 },
    #[error("transfer {0} not found")]
    NotFound(u64),
    #[error("only continuous transfers have a rate")]
    NotContinuous,
}

// ---------------------------------------------------------------------------
// TransferSystem
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TransferSystem;

impl TransferSystem {
    pub fn new() -> Self {
        Self
    }

    /// Probe delta-v budget in km/s.
    pub fn probe_delta_v_capacity_km_s(registry: &Registry, skills: &Skills) -> f64 {
        let rules = registry.rules();
        let propulsion = non_negative(rules.skill_coefficients.propulsion.factor(skills));
        let isp = rules.propulsion.base_isp_s * propulsion;
        let ratio = rules.propulsion.probe_mass_ratio.max(1.0);
        finite_or_zero(isp * G0 * ratio.ln() / 1_000.0)
    }

    /// Transit time in days, shortened by the propulsion skill.
    pub fn transit_days(registry: &Registry, skills: &Skills, from: &ZoneId, to: &ZoneId) -> Option<f64> {
        let rules = registry.rules();
        let base = registry
            .orbital()
            .hohmann_transfer_days(from, to, rules.time.seconds_per_day)?;
        let propulsion = rules.skill_coefficients.propulsion.factor(skills).max(rules.reduction_factor_floor);
        Some(non_negative(safe_div(base, propulsion, base)))
    }

    /// Mass-driver launch capacity of a zone, kg/day.
    pub fn mass_driver_capacity(state: &GameState, registry: &Registry, zone: &ZoneId) -> f64 {
        ProductionCalculator::structure_sum(state, zone, registry, |d| d.mass_driver_capacity_kg_per_day)
    }

    /// Validate and register a transfer. One-time amounts leave the origin
    /// immediately.
    pub fn create(
        state: &mut GameState,
        registry: &Registry,
        request: TransferRequest,
    ) -> Result<TransferId, TransferError> {
        let TransferRequest {
            origin,
            destination,
            resource,
            kind,
        } = request;
        if origin == destination {
            return Err(TransferError::SameZone);
        }
        for zone in [&origin, &destination] {
            if registry.zone(zone).is_none() {
                return Err(TransferError::UnknownZone(zone.clone()));
            }
        }
        match kind {
            TransferRequestKind::OneTime { amount } if !(amount.is_finite() && amount > 0.0) => {
                return Err(TransferError::InvalidAmount(amount));
            }
            TransferRequestKind::Continuous { rate_percentage } => validate_rate(rate_percentage)?,
            _ => {}
        }

        let skills = state.skills;
        match resource {
            TransferResource::Probes => {
                let required_km_s = registry
                    .orbital()
                    .transfer_delta_v_km_s(&origin, &destination)
                    .unwrap_or(f64::INFINITY);
                let capacity_km_s = Self::probe_delta_v_capacity_km_s(registry, &skills);
                if required_km_s > capacity_km_s {
                    return Err(TransferError::InsufficientDeltaV {
                        required_km_s,
                        capacity_km_s,
                    });
                }
            }
            TransferResource::Metal => {
                if Self::mass_driver_capacity(state, registry, &origin) <= 0.0 {
                    return Err(TransferError::NoMassDriver(origin));
                }
            }
        }
        let transit_days = Self::transit_days(registry, &skills, &origin, &destination)
            .ok_or_else(|| TransferError::UnknownZone(destination.clone()))?;

        state.ensure_zone(&origin, registry);
        state.ensure_zone(&destination, registry);

        let mut transfer = Transfer {
            origin: origin.clone(),
            destination,
            resource,
            kind: TransferKind::OneTime,
            transit_days,
            paused: false,
            in_flight: VecDeque::new(),
            total_sent: 0.0,
            total_delivered: 0.0,
        };

        match kind {
            TransferRequestKind::OneTime { amount } => {
                match resource {
                    TransferResource::Probes => {
                        let have = state.probe_count(&origin);
                        if have < amount {
                            return Err(TransferError::InsufficientProbes { have, need: amount });
                        }
                        state.remove_probes(&origin, amount, registry.rules().probe.mass_kg);
                    }
                    TransferResource::Metal => {
                        let have = state.zone(&origin).map(|z| z.stored_metal).unwrap_or(0.0);
                        if have < amount {
                            return Err(TransferError::InsufficientMetal { have, need: amount });
                        }
                        if let Some(zone) = state.zone_mut(&origin) {
                            zone.stored_metal = non_negative(zone.stored_metal - amount);
                        }
                    }
                }
                transfer.in_flight.push_back(Shipment {
                    amount,
                    remaining_days: transit_days,
                });
                transfer.total_sent = amount;
            }
            TransferRequestKind::Continuous { rate_percentage } => {
                transfer.kind = TransferKind::Continuous { rate_percentage };
            }
        }

        let id = state.transfers.insert(transfer);
        tracing::debug!(id = external_id(id), "transfer created");
        Ok(id)
    }

    /// Change a continuous transfer's rate.
    pub fn update(state: &mut GameState, id: TransferId, rate_percentage: f64) -> Result<(), TransferError> {
        validate_rate(rate_percentage)?;
        let transfer = state
            .transfers
            .get_mut(id)
            .ok_or(TransferError::NotFound(external_id(id)))?;
        match &mut transfer.kind {
            TransferKind::Continuous { rate_percentage: rate } => {
                *rate = rate_percentage;
                Ok(())
            }
            TransferKind::OneTime => Err(TransferError::NotContinuous),
        }
    }

    pub fn set_paused(state: &mut GameState, id: TransferId, paused: bool) -> Result<(), TransferError> {
        let transfer = state
            .transfers
            .get_mut(id)
            .ok_or(TransferError::NotFound(external_id(id)))?;
        transfer.paused = paused;
        Ok(())
    }

    /// Remove a transfer. Anything in flight is lost.
    pub fn delete(state: &mut GameState, id: TransferId) -> Result<Transfer, TransferError> {
        let transfer = state
            .transfers
            .remove(id)
            .ok_or(TransferError::NotFound(external_id(id)))?;
        let lost = transfer.amount_in_flight();
        if lost > 0.0 {
            tracing::info!(id = external_id(id), lost, "transfer deleted with shipments in flight");
        }
        Ok(transfer)
    }

    /// Totals in flight as `(probes, metal_kg)`.
    pub fn in_flight_totals(state: &GameState) -> (f64, f64) {
        state.transfers.values().fold((0.0, 0.0), |(p, m), t| match t.resource {
            TransferResource::Probes => (p + t.amount_in_flight(), m),
            TransferResource::Metal => (p, m + t.amount_in_flight()),
        })
    }

    fn deliver(state: &mut GameState, ctx: &mut TickContext<'_>, id: TransferId) {
        let probe_mass = ctx.rules().probe.mass_kg;
        let Some(transfer) = state.transfers.get_mut(id) else {
            return;
        };
        let mut landed = 0.0;
        for shipment in transfer.in_flight.iter_mut() {
            shipment.remaining_days -= ctx.delta_days;
        }
        while transfer.in_flight.front().is_some_and(|s| s.remaining_days <= 0.0) {
            if let Some(shipment) = transfer.in_flight.pop_front() {
                landed += shipment.amount;
            }
        }
        if landed <= 0.0 {
            return;
        }
        transfer.total_delivered += landed;
        let destination = transfer.destination.clone();
        let resource = transfer.resource;

        match resource {
            TransferResource::Probes => state.add_probes(&destination, landed, probe_mass),
            TransferResource::Metal => {
                if let Some(zone) = state.ensure_zone(&destination, ctx.registry) {
                    zone.stored_metal += landed;
                }
            }
        }
        tracing::info!(id = external_id(id), zone = %destination, amount = landed, "shipment delivered");
        ctx.ledger.emit(EconomyEvent::ShipmentDelivered {
            transfer: id,
            destination,
            resource,
            amount: landed,
            tick: ctx.tick,
        });
    }

    fn send_continuous(state: &mut GameState, ctx: &mut TickContext<'_>, id: TransferId) {
        let Some(transfer) = state.transfers.get(id) else {
            return;
        };
        let TransferKind::Continuous { rate_percentage } = transfer.kind else {
            return;
        };
        let origin = transfer.origin.clone();
        let resource = transfer.resource;
        let fraction = (rate_percentage / 100.0).clamp(0.0, 1.0);

        let amount = match resource {
            TransferResource::Probes => {
                let produced = ctx.ledger.flows(&origin).probes_built;
                let wanted = (produced * fraction).min(state.probe_count(&origin));
                state.remove_probes(&origin, wanted, ctx.rules().probe.mass_kg)
            }
            TransferResource::Metal => {
                let capacity = Self::mass_driver_capacity(state, ctx.registry, &origin);
                let wanted = capacity * fraction * ctx.energy_throttle * ctx.delta_days;
                match state.zone_mut(&origin) {
                    Some(zone) => {
                        let sent = wanted.min(zone.stored_metal);
                        zone.stored_metal = non_negative(zone.stored_metal - sent);
                        sent
                    }
                    None => 0.0,
                }
            }
        };
        if amount <= 0.0 {
            return;
        }
        if let Some(transfer) = state.transfers.get_mut(id) {
            transfer.in_flight.push_back(Shipment {
                amount,
                remaining_days: transfer.transit_days,
            });
            transfer.total_sent += amount;
        }
    }
}

fn validate_rate(rate_percentage: f64) -> Result<(), TransferError> {
    if rate_percentage.is_finite() && rate_percentage > 0.0 && rate_percentage <= 100.0 {
        Ok(())
    } else {
        Err(TransferError::InvalidRate(rate_percentage))
    }
}

impl TickSystem for TransferSystem {
    fn name(&self) -> &'static str {
        "transfers"
    }

    fn run(&mut self, state: &mut GameState, ctx: &mut TickContext<'_>) {
        let ids: Vec<TransferId> = state.transfers.keys().collect();
        for id in ids {
            if state.transfers.get(id).is_none_or(|t| t.paused) {
                continue;
            }
            Self::deliver(state, ctx, id);
            Self::send_continuous(state, ctx, id);
        }
        state
            .transfers
            .retain(|_, t| t.is_continuous() || !t.in_flight.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillName;
    use crate::test_utils::*;

    fn probe_request(amount: f64) -> TransferRequest {
        TransferRequest {
            origin: earth(),
            destination: mars(),
            resource: TransferResource::Probes,
            kind: TransferRequestKind::OneTime { amount },
        }
    }

    fn tick(state: &mut GameState, registry: &Registry, dt: f64) -> Vec<EconomyEvent> {
        let mut ctx = TickContext::new(registry, state, dt, 1.0);
        TransferSystem::new().run(state, &mut ctx);
        ctx.ledger.drain_events()
    }

    // Test 1: One-time probe transfer deducts at creation and delivers once
    #[test]
    fn one_time_probe_transfer_conserves_probes() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let id = TransferSystem::create(&mut state, &registry, probe_request(4.0)).unwrap();
        assert_eq!(state.probe_count(&earth()), 6.0);
        assert_eq!(TransferSystem::in_flight_totals(&state).0, 4.0);

        let transit = state.transfers[id].transit_days;
        let events = tick(&mut state, &registry, transit + 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(state.probe_count(&mars()), 4.0);
        assert!(state.transfers.get(id).is_none());

        tick(&mut state, &registry, transit + 1.0);
        assert_eq!(state.probe_count(&mars()), 4.0);
    }

    // Test 2: Creation fails without enough probes and changes nothing
    #[test]
    fn insufficient_probes_rejected() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 2.0, harvest_only());
        let err = TransferSystem::create(&mut state, &registry, probe_request(5.0)).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientProbes { .. }));
        assert_eq!(state.probe_count(&earth()), 2.0);
        assert!(state.transfers.is_empty());
    }

    // Test 3: Shipments stay in flight until transit elapses
    #[test]
    fn shipment_waits_for_transit() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        TransferSystem::create(&mut state, &registry, probe_request(1.0)).unwrap();
        tick(&mut state, &registry, 1.0);
        assert_eq!(state.probe_count(&mars()), 0.0);
        assert_eq!(TransferSystem::in_flight_totals(&state).0, 1.0);
    }

    // Test 4: Paused transfers do not advance
    #[test]
    fn paused_transfer_is_frozen() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let id = TransferSystem::create(&mut state, &registry, probe_request(1.0)).unwrap();
        let transit = state.transfers[id].transit_days;
        TransferSystem::set_paused(&mut state, id, true).unwrap();
        tick(&mut state, &registry, transit * 2.0);
        assert_eq!(state.transfers[id].in_flight[0].remaining_days, transit);

        TransferSystem::set_paused(&mut state, id, false).unwrap();
        tick(&mut state, &registry, transit * 2.0);
        assert_eq!(state.probe_count(&mars()), 1.0);
    }

    // Test 5: Deleting forfeits in-flight probes
    #[test]
    fn delete_forfeits_in_flight() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let id = TransferSystem::create(&mut state, &registry, probe_request(3.0)).unwrap();
        let removed = TransferSystem::delete(&mut state, id).unwrap();
        assert_eq!(removed.amount_in_flight(), 3.0);
        assert_eq!(state.total_probes(), 7.0);
        assert!(TransferSystem::delete(&mut state, id).is_err());
    }

    // Test 6: Continuous probe transfer ships a share of this tick's production
    #[test]
    fn continuous_probe_transfer_follows_production() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let id = TransferSystem::create(
            &mut state,
            &registry,
            TransferRequest {
                kind: TransferRequestKind::Continuous { rate_percentage: 50.0 },
                ..probe_request(0.0)
            },
        )
        .unwrap();

        let mut ctx = TickContext::new(&registry, &state, 1.0, 1.0);
        ctx.ledger.zone(&earth()).probes_built = 2.0;
        TransferSystem::new().run(&mut state, &mut ctx);

        assert_eq!(state.probe_count(&earth()), 9.0);
        assert_eq!(state.transfers[id].amount_in_flight(), 1.0);
    }

    // Test 7: Continuous metal transfer uses mass-driver capacity
    #[test]
    fn continuous_metal_uses_mass_drivers() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 1.0, harvest_only());
        state.zone_mut(&earth()).unwrap().stored_metal = 10_000.0;
        let request = TransferRequest {
            origin: earth(),
            destination: mars(),
            resource: TransferResource::Metal,
            kind: TransferRequestKind::Continuous { rate_percentage: 25.0 },
        };
        assert!(matches!(
            TransferSystem::create(&mut state, &registry, request.clone()),
            Err(TransferError::NoMassDriver(_))
        ));

        state.add_structure(&earth(), &building("mass_driver"));
        let id = TransferSystem::create(&mut state, &registry, request).unwrap();
        tick(&mut state, &registry, 1.0);
        assert_eq!(state.zone(&earth()).unwrap().stored_metal, 9_750.0);
        assert_eq!(state.transfers[id].amount_in_flight(), 250.0);

        TransferSystem::update(&mut state, id, 50.0).unwrap();
        tick(&mut state, &registry, 1.0);
        assert_eq!(state.zone(&earth()).unwrap().stored_metal, 9_250.0);
    }

    // Test 8: Probes cannot reach zones beyond their delta-v
    #[test]
    fn delta_v_gates_probe_transfers() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let request = TransferRequest {
            destination: dyson_zone(),
            ..probe_request(1.0)
        };
        assert!(matches!(
            TransferSystem::create(&mut state, &registry, request),
            Err(TransferError::InsufficientDeltaV { .. })
        ));
    }

    // Test 9: Propulsion skill shortens transit
    #[test]
    fn propulsion_shortens_transit() {
        let registry = test_registry();
        let base = TransferSystem::transit_days(&registry, &Skills::baseline(), &earth(), &mars()).unwrap();
        let fast_skills = Skills::baseline().with(SkillName::Propulsion, 2.0);
        let fast = TransferSystem::transit_days(&registry, &fast_skills, &earth(), &mars()).unwrap();
        assert!((fast - base / 1.7).abs() < 1e-9);
    }

    // Test 10: Rate updates are validated and only apply to continuous transfers
    #[test]
    fn update_validation() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let id = TransferSystem::create(&mut state, &registry, probe_request(1.0)).unwrap();
        assert_eq!(TransferSystem::update(&mut state, id, 10.0), Err(TransferError::NotContinuous));
        assert_eq!(TransferSystem::update(&mut state, id, 150.0), Err(TransferError::InvalidRate(150.0)));
    }

    // Test 11: External ids round-trip
    #[test]
    fn external_ids_round_trip() {
        let registry = test_registry();
        let mut state = state_with_probes(&registry, &earth(), 10.0, harvest_only());
        let id = TransferSystem::create(&mut state, &registry, probe_request(1.0)).unwrap();
        assert_eq!(from_external_id(external_id(id)), id);
    }
}

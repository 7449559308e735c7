//! Player actions.
//!
//! Actions are applied between ticks. Each one is validated in full before
//! anything is mutated, so a rejected action leaves the game untouched.
//! [`GameEngine::perform_action`] never fails: errors come back as an
//! [`ActionOutcome`] with `success: false`.
//!
//! The JSON entry points take a flat payload tagged by `type`:
//!
//! ```json
//! {"type": "purchase_structure", "zone_id": "mercury", "building_id": "power_station", "enabled": true}
//! ```

use std::sync::Arc;

use brachisto_core::id::{BuildingId, ConstructionKey, TierId, TreeId, ZoneId};
use brachisto_core::recycling::{RecyclingError, RecyclingSystem};
use brachisto_core::time::{InvalidTimeSpeed, TimeSpeed};
use brachisto_core::transfer::{
    TransferError, TransferRequest, TransferRequestKind, TransferResource, TransferSystem, external_id,
    from_external_id,
};
use brachisto_tech_tree::{ResearchCategory, TechTreeError};
use serde::{Deserialize, Serialize};

use crate::engine::{GameEngine, derive_economics};

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Enable or disable construction of a building in a zone. Metal is
    /// drawn as construction progresses, not up front.
    PurchaseStructure {
        zone_id: ZoneId,
        building_id: BuildingId,
        /// Toggles when absent.
        enabled: Option<bool>,
        /// Stop once the zone holds this many.
        target_count: Option<u32>,
    },
    /// Buy probes with the zone's stored metal.
    PurchaseProbe {
        zone_id: ZoneId,
        #[serde(default = "one")]
        count: f64,
    },
    /// Set some or all of a zone's allocation fractions.
    AllocateProbes {
        zone_id: ZoneId,
        harvest: Option<f64>,
        construct: Option<f64>,
        replicate: Option<f64>,
        recycle: Option<f64>,
        recycle_probes: Option<f64>,
        dyson: Option<f64>,
    },
    /// One-time with `amount`, continuous with `rate_percentage`.
    CreateTransfer {
        from_zone: ZoneId,
        to_zone: ZoneId,
        resource: TransferResource,
        amount: Option<f64>,
        rate_percentage: Option<f64>,
    },
    UpdateTransfer {
        transfer_id: u64,
        rate_percentage: f64,
    },
    PauseTransfer {
        transfer_id: u64,
        /// Toggles when absent.
        paused: Option<bool>,
    },
    DeleteTransfer {
        transfer_id: u64,
    },
    AllocateResearch {
        tree_id: TreeId,
        tier_id: TierId,
        /// Toggles when absent.
        enabled: Option<bool>,
    },
    ToggleResearchCategory {
        category: ResearchCategory,
        #[serde(default)]
        enabled: bool,
    },
    SetTimeSpeed {
        speed: f64,
    },
    SetDysonPowerAllocation {
        compute_percentage: f64,
    },
    SetProbeRecycleTarget {
        zone_id: ZoneId,
        target_percentage: f64,
    },
    RecycleStructure {
        zone_id: ZoneId,
        building_id: BuildingId,
    },
}

fn one() -> f64 {
    1.0
}

/// Every recognised value of the `type` field.
pub const ACTION_TYPES: [&str; 13] = [
    "purchase_structure",
    "purchase_probe",
    "allocate_probes",
    "create_transfer",
    "update_transfer",
    "pause_transfer",
    "delete_transfer",
    "allocate_research",
    "toggle_research_category",
    "set_time_speed",
    "set_dyson_power_allocation",
    "set_probe_recycle_target",
    "recycle_structure",
];

// ---------------------------------------------------------------------------
// Outcome and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Tiers switched by a category toggle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggled: Option<usize>,
    /// Metal recovered by recycling a structure, kg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal_kg: Option<f64>,
}

impl ActionOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    fn failure(error: &ActionError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action type")]
    UnknownActionType(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("unknown zone '{0}'")]
    UnknownZone(ZoneId),
    #[error("unknown building '{0}'")]
    UnknownBuilding(BuildingId),
    #[error("mining buildings cannot be built in the Dyson zone")]
    MiningInDysonZone,
    #[error("'{building}' is not allowed in zone '{zone}'")]
    NotAllowedInZone { zone: ZoneId, building: BuildingId },
    #[error("zone '{zone}' already has the maximum of {max} '{building}'")]
    ZoneLimitReached { zone: ZoneId, building: BuildingId, max: u32 },
    #[error("target count {target} is not above the current count {count}")]
    TargetAlreadyReached { target: u32, count: u32 },
    #[error("not enough metal in '{zone}': have {have} kg, need {need} kg")]
    InsufficientMetal { zone: ZoneId, have: f64, need: f64 },
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Research(#[from] TechTreeError),
    #[error(transparent)]
    Recycling(#[from] RecyclingError),
    #[error(transparent)]
    TimeSpeed(#[from] InvalidTimeSpeed),
}

fn check_range(field: &'static str, value: f64, max: f64) -> Result<f64, ActionError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ActionError::OutOfRange {
            field,
            expected: if max == 1.0 { "in [0, 1]" } else { "in [0, 100]" },
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

impl GameEngine {
    /// Apply one action. Never panics and never returns an error; check
    /// [`ActionOutcome::success`].
    pub fn perform_action(&mut self, action: Action) -> ActionOutcome {
        match self.apply_action(action) {
            Ok(outcome) => {
                self.refresh_after_action();
                outcome
            }
            Err(error) => {
                tracing::warn!(%error, "action rejected");
                ActionOutcome::failure(&error)
            }
        }
    }

    /// Apply an action given as its type and a flat JSON payload.
    pub fn perform(&mut self, action_type: &str, payload: serde_json::Value) -> ActionOutcome {
        match parse_action(action_type, payload) {
            Ok(action) => self.perform_action(action),
            Err(error) => {
                tracing::warn!(%error, action_type, "action rejected");
                ActionOutcome::failure(&error)
            }
        }
    }

    /// Apply an action given as a JSON object with a `type` field.
    pub fn perform_action_json(&mut self, json: &str) -> ActionOutcome {
        let value = match serde_json::from_str::<serde_json::Value>(json) {
            Ok(value) => value,
            Err(e) => return ActionOutcome::failure(&ActionError::InvalidPayload(e.to_string())),
        };
        let action_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        self.perform(&action_type, value)
    }

    fn refresh_after_action(&mut self) {
        let registry = Arc::clone(&self.registry);
        let state = Arc::make_mut(&mut self.state);
        state.research = self.tech_tree.export_state();
        state.derived = derive_economics(state, &registry);
    }

    fn apply_action(&mut self, action: Action) -> Result<ActionOutcome, ActionError> {
        match action {
            Action::PurchaseStructure {
                zone_id,
                building_id,
                enabled,
                target_count,
            } => self.purchase_structure(zone_id, building_id, enabled, target_count),
            Action::PurchaseProbe { zone_id, count } => self.purchase_probe(zone_id, count),
            Action::AllocateProbes {
                zone_id,
                harvest,
                construct,
                replicate,
                recycle,
                recycle_probes,
                dyson,
            } => {
                self.require_zone(&zone_id)?;
                let mut allocations = self.state.allocations(&zone_id);
                let fields = [
                    ("harvest", harvest, &mut allocations.harvest),
                    ("construct", construct, &mut allocations.construct),
                    ("replicate", replicate, &mut allocations.replicate),
                    ("recycle", recycle, &mut allocations.recycle),
                    ("recycle_probes", recycle_probes, &mut allocations.recycle_probes),
                    ("dyson", dyson, &mut allocations.dyson),
                ];
                for (field, value, slot) in fields {
                    if let Some(value) = value {
                        *slot = check_range(field, value, 1.0)?;
                    }
                }
                Arc::make_mut(&mut self.state)
                    .probe_allocations
                    .insert(zone_id, allocations);
                Ok(ActionOutcome::ok())
            }
            Action::CreateTransfer {
                from_zone,
                to_zone,
                resource,
                amount,
                rate_percentage,
            } => {
                let kind = match (amount, rate_percentage) {
                    (Some(amount), None) => TransferRequestKind::OneTime { amount },
                    (None, Some(rate_percentage)) => TransferRequestKind::Continuous { rate_percentage },
                    _ => {
                        return Err(ActionError::InvalidPayload(
                            "exactly one of amount or rate_percentage is required".to_string(),
                        ));
                    }
                };
                let request = TransferRequest {
                    origin: from_zone,
                    destination: to_zone,
                    resource,
                    kind,
                };
                let state = Arc::make_mut(&mut self.state);
                let id = TransferSystem::create(state, &self.registry, request)?;
                Ok(ActionOutcome {
                    transfer_id: Some(external_id(id)),
                    ..ActionOutcome::ok()
                })
            }
            Action::UpdateTransfer {
                transfer_id,
                rate_percentage,
            } => {
                let state = Arc::make_mut(&mut self.state);
                TransferSystem::update(state, from_external_id(transfer_id), rate_percentage)?;
                Ok(ActionOutcome::ok())
            }
            Action::PauseTransfer { transfer_id, paused } => {
                let id = from_external_id(transfer_id);
                let current = self
                    .state
                    .transfers
                    .get(id)
                    .map(|t| t.paused)
                    .ok_or(TransferError::NotFound(transfer_id))?;
                let paused = paused.unwrap_or(!current);
                TransferSystem::set_paused(Arc::make_mut(&mut self.state), id, paused)?;
                Ok(ActionOutcome {
                    enabled: Some(!paused),
                    ..ActionOutcome::ok()
                })
            }
            Action::DeleteTransfer { transfer_id } => {
                let id = from_external_id(transfer_id);
                if !self.state.transfers.contains_key(id) {
                    return Err(TransferError::NotFound(transfer_id).into());
                }
                TransferSystem::delete(Arc::make_mut(&mut self.state), id)?;
                Ok(ActionOutcome::ok())
            }
            Action::AllocateResearch {
                tree_id,
                tier_id,
                enabled,
            } => {
                let enabled = enabled.unwrap_or_else(|| !self.tech_tree.tier_progress(&tree_id, &tier_id).enabled);
                self.tech_tree.set_enabled(&tree_id, &tier_id, enabled)?;
                Ok(ActionOutcome {
                    enabled: Some(enabled),
                    ..ActionOutcome::ok()
                })
            }
            Action::ToggleResearchCategory { category, enabled } => {
                let toggled = self.tech_tree.set_category_enabled(category, enabled);
                tracing::debug!(?category, enabled, toggled, "research category toggled");
                Ok(ActionOutcome {
                    enabled: Some(enabled),
                    toggled: Some(toggled),
                    ..ActionOutcome::ok()
                })
            }
            Action::SetTimeSpeed { speed } => {
                let speed = TimeSpeed::try_from(speed)?;
                self.time.set_speed(speed);
                Ok(ActionOutcome::ok())
            }
            Action::SetDysonPowerAllocation { compute_percentage } => {
                let pct = check_range("compute_percentage", compute_percentage, 100.0)?;
                Arc::make_mut(&mut self.state).dyson.compute_allocation = pct / 100.0;
                Ok(ActionOutcome::ok())
            }
            Action::SetProbeRecycleTarget {
                zone_id,
                target_percentage,
            } => {
                self.require_zone(&zone_id)?;
                let pct = check_range("target_percentage", target_percentage, 100.0)?;
                Arc::make_mut(&mut self.state)
                    .probe_recycle_targets
                    .insert(zone_id, pct / 100.0);
                Ok(ActionOutcome::ok())
            }
            Action::RecycleStructure { zone_id, building_id } => {
                self.require_zone(&zone_id)?;
                let state = Arc::make_mut(&mut self.state);
                let salvage = RecyclingSystem::recycle_structure(state, &self.registry, &zone_id, &building_id)?;
                Ok(ActionOutcome {
                    metal_kg: Some(salvage.metal_kg),
                    ..ActionOutcome::ok()
                })
            }
        }
    }

    fn require_zone(&self, zone: &ZoneId) -> Result<(), ActionError> {
        match self.registry.zone(zone) {
            Some(_) => Ok(()),
            None => Err(ActionError::UnknownZone(zone.clone())),
        }
    }

    fn purchase_structure(
        &mut self,
        zone_id: ZoneId,
        building_id: BuildingId,
        enabled: Option<bool>,
        target_count: Option<u32>,
    ) -> Result<ActionOutcome, ActionError> {
        let registry = Arc::clone(&self.registry);
        let def = registry
            .building(&building_id)
            .ok_or_else(|| ActionError::UnknownBuilding(building_id.clone()))?;
        self.require_zone(&zone_id)?;
        // The Dyson zone takes any non-mining building.
        if registry.is_dyson_zone(&zone_id) {
            if def.is_mining() {
                return Err(ActionError::MiningInDysonZone);
            }
        } else if !def.allowed_in(&zone_id) {
            return Err(ActionError::NotAllowedInZone {
                zone: zone_id,
                building: building_id,
            });
        }

        let key = ConstructionKey::new(zone_id.clone(), building_id.clone());
        let enabled = enabled.unwrap_or_else(|| !self.state.enabled_construction.contains(&key));
        let count = self.state.structure_count(&zone_id, &building_id);
        if enabled {
            if let Some(max) = def.max_per_zone.filter(|&max| count >= max) {
                return Err(ActionError::ZoneLimitReached {
                    zone: zone_id,
                    building: building_id,
                    max,
                });
            }
            if let Some(target) = target_count.filter(|&t| t <= count) {
                return Err(ActionError::TargetAlreadyReached { target, count });
            }
        }

        let state = Arc::make_mut(&mut self.state);
        state.ensure_zone(&zone_id, &registry);
        if enabled {
            state.construction_progress.entry(key.clone()).or_insert(0.0);
            match target_count {
                Some(target) => state.construction_targets.insert(key.clone(), target),
                None => state.construction_targets.remove(&key),
            };
            state.enabled_construction.insert(key);
        } else {
            // Invested metal stays with the slot until it is re-enabled.
            state.enabled_construction.remove(&key);
            state.construction_targets.remove(&key);
        }
        tracing::debug!(zone = %zone_id, building = %building_id, enabled, "construction toggled");
        Ok(ActionOutcome {
            enabled: Some(enabled),
            ..ActionOutcome::ok()
        })
    }

    fn purchase_probe(&mut self, zone_id: ZoneId, count: f64) -> Result<ActionOutcome, ActionError> {
        self.require_zone(&zone_id)?;
        if !(count.is_finite() && count > 0.0) {
            return Err(ActionError::OutOfRange {
                field: "count",
                expected: "positive",
                value: count,
            });
        }
        let probe_mass = self.registry.rules().probe.mass_kg;
        let need = count * probe_mass;
        let have = self.state.zone(&zone_id).map(|z| z.stored_metal).unwrap_or(0.0);
        if have < need {
            return Err(ActionError::InsufficientMetal {
                zone: zone_id,
                have,
                need,
            });
        }
        let registry = Arc::clone(&self.registry);
        let state = Arc::make_mut(&mut self.state);
        if let Some(zone) = state.ensure_zone(&zone_id, &registry) {
            zone.stored_metal = (zone.stored_metal - need).max(0.0);
        }
        state.add_probes(&zone_id, count, probe_mass);
        Ok(ActionOutcome::ok())
    }
}

/// Build an [`Action`] from its type name and a flat payload. Unknown types
/// are rejected before the payload is looked at.
pub fn parse_action(action_type: &str, payload: serde_json::Value) -> Result<Action, ActionError> {
    if !ACTION_TYPES.contains(&action_type) {
        return Err(ActionError::UnknownActionType(action_type.to_string()));
    }
    let mut object = match payload {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => return Err(ActionError::InvalidPayload(format!("expected an object, got {other}"))),
    };
    object.insert("type".to_string(), serde_json::Value::String(action_type.to_string()));
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| ActionError::InvalidPayload(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use brachisto_core::id::BuildingId;
    use brachisto_core::test_utils::*;
    use brachisto_tech_tree::{ResearchTreeDef, TechTree, TierDef};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn tech_tree() -> TechTree {
        let tier = |id: &str| TierDef {
            id: TierId::from(id),
            name: String::new(),
            tranches: 10,
            tranche_cost_intelligence: 1e30,
            effects: BTreeMap::new(),
        };
        TechTree::with_trees([ResearchTreeDef {
            id: TreeId::from("propulsion"),
            name: String::new(),
            category: ResearchCategory::Dexterity,
            tiers: vec![tier("t1"), tier("t2")],
        }])
        .unwrap()
    }

    fn engine() -> GameEngine {
        let config = EngineConfig {
            initial_probes: 10.0,
            initial_allocations: harvest_only(),
            ..EngineConfig::default()
        };
        GameEngine::new(test_registry(), tech_tree(), config).unwrap()
    }

    fn engine_with_metal(metal: f64) -> GameEngine {
        let config = EngineConfig {
            initial_probes: 10.0,
            initial_metal_kg: metal,
            initial_allocations: harvest_only(),
            ..EngineConfig::default()
        };
        GameEngine::new(test_registry(), tech_tree(), config).unwrap()
    }

    // Test 1: Unknown action types are rejected without mutation
    #[test]
    fn unknown_action_type() {
        let mut engine = engine();
        let hash = engine.state_hash();
        let outcome = engine.perform("launch_missiles", json!({}));
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Unknown action type"));
        let outcome = engine.perform_action_json(r#"{"zone_id": "earth"}"#);
        assert_eq!(outcome.error.as_deref(), Some("Unknown action type"));
        assert_eq!(engine.state_hash(), hash);
    }

    // Test 2: A structure purchase with no metal still succeeds
    #[test]
    fn purchase_without_metal() {
        let mut engine = engine();
        let outcome = engine.perform(
            "purchase_structure",
            json!({"zone_id": "mercury", "building_id": "power_station", "enabled": true}),
        );
        assert!(outcome.success, "{outcome:?}");
        let key = ConstructionKey::new(mercury(), building("power_station"));
        let state = engine.state();
        assert!(state.enabled_construction.contains(&key));
        assert_eq!(state.construction_progress[&key], 0.0);
    }

    // Test 3: Zone rules for structures
    #[test]
    fn structure_zone_rules() {
        let mut engine = engine();
        let outcome = engine.perform(
            "purchase_structure",
            json!({"zone_id": "dyson_sphere", "building_id": "mining_station"}),
        );
        assert!(!outcome.success);
        // Refineries are limited to earth and mars, except in the Dyson zone.
        let outcome = engine.perform(
            "purchase_structure",
            json!({"zone_id": "mercury", "building_id": "refinery"}),
        );
        assert!(!outcome.success);
        let outcome = engine.perform(
            "purchase_structure",
            json!({"zone_id": "dyson_sphere", "building_id": "refinery"}),
        );
        assert!(outcome.success);
    }

    // Test 4: Omitting enabled toggles; targets are stored
    #[test]
    fn structure_toggle_and_target() {
        let mut engine = engine();
        let payload = json!({"zone_id": "earth", "building_id": "factory", "target_count": 3});
        assert_eq!(engine.perform("purchase_structure", payload).enabled, Some(true));
        let key = ConstructionKey::new(earth(), building("factory"));
        assert_eq!(engine.state().construction_targets[&key], 3);

        let payload = json!({"zone_id": "earth", "building_id": "factory"});
        assert_eq!(engine.perform("purchase_structure", payload).enabled, Some(false));
        assert!(!engine.state().enabled_construction.contains(&key));
        assert!(!engine.state().construction_targets.contains_key(&key));
    }

    // Test 5: Buying probes spends metal and conserves mass
    #[test]
    fn purchase_probe() {
        let mut engine = engine_with_metal(250.0);
        let before = zone_mass(&engine.state(), &earth());
        assert!(engine.perform("purchase_probe", json!({"zone_id": "earth", "count": 2})).success);
        let state = engine.state();
        assert_eq!(state.probe_count(&earth()), 12.0);
        assert_eq!(state.zone(&earth()).unwrap().stored_metal, 50.0);
        assert_eq!(zone_mass(&state, &earth()), before);

        let outcome = engine.perform("purchase_probe", json!({"zone_id": "earth"}));
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not enough metal"));
    }

    // Test 6: Allocations merge and are range checked
    #[test]
    fn allocate_probes() {
        let mut engine = engine();
        let outcome = engine.perform("allocate_probes", json!({"zone_id": "earth", "replicate": 0.5}));
        assert!(outcome.success);
        let alloc = engine.state().allocations(&earth());
        assert_eq!(alloc.harvest, 1.0);
        assert_eq!(alloc.replicate, 0.5);

        let outcome = engine.perform("allocate_probes", json!({"zone_id": "earth", "dyson": 1.5}));
        assert!(!outcome.success);
        assert_eq!(engine.state().allocations(&earth()).dyson, 0.0);
    }

    // Test 7: Transfers through the action API
    #[test]
    fn transfer_lifecycle() {
        let mut engine = engine();
        let outcome = engine.perform(
            "create_transfer",
            json!({"from_zone": "earth", "to_zone": "mars", "resource": "probes", "amount": 4}),
        );
        assert!(outcome.success, "{outcome:?}");
        let id = outcome.transfer_id.unwrap();
        assert_eq!(engine.state().probe_count(&earth()), 6.0);
        assert_eq!(engine.state().derived.probes_in_flight, 4.0);

        assert_eq!(engine.perform("pause_transfer", json!({"transfer_id": id})).enabled, Some(false));
        assert!(engine.state().transfers[from_external_id(id)].paused);
        assert!(engine.perform("delete_transfer", json!({"transfer_id": id})).success);
        assert!(!engine.perform("delete_transfer", json!({"transfer_id": id})).success);

        let outcome = engine.perform(
            "create_transfer",
            json!({"from_zone": "earth", "to_zone": "mars", "resource": "probes"}),
        );
        assert!(!outcome.success);
    }

    // Test 8: Research allocation and category toggle
    #[test]
    fn research_actions() {
        let mut engine = engine();
        let outcome = engine.perform("allocate_research", json!({"tree_id": "propulsion", "tier_id": "t2", "enabled": true}));
        assert!(!outcome.success);

        let outcome = engine.perform("allocate_research", json!({"tree_id": "propulsion", "tier_id": "t1"}));
        assert_eq!(outcome.enabled, Some(true));
        let tree = TreeId::from("propulsion");
        assert!(engine.state().research[&tree][&TierId::from("t1")].enabled);

        let outcome = engine.perform("toggle_research_category", json!({"category": "dexterity", "enabled": false}));
        assert_eq!(outcome.toggled, Some(1));
        assert!(!engine.state().research[&tree][&TierId::from("t1")].enabled);

        assert!(!engine.perform("toggle_research_category", json!({"category": "charisma"})).success);
    }

    // Test 9: Time speed and Dyson allocation
    #[test]
    fn speed_and_dyson_allocation() {
        let mut engine = engine();
        assert!(engine.perform("set_time_speed", json!({"speed": 10})).success);
        assert_eq!(engine.time().speed(), TimeSpeed::X10);
        assert!(!engine.perform("set_time_speed", json!({"speed": 3})).success);

        assert!(engine.perform("set_dyson_power_allocation", json!({"compute_percentage": 25})).success);
        assert_eq!(engine.state().dyson.compute_allocation, 0.25);
        assert!(!engine.perform("set_dyson_power_allocation", json!({"compute_percentage": 101})).success);
    }

    // Test 10: Recycle target and structure recycling
    #[test]
    fn recycling_actions() {
        let config = EngineConfig {
            initial_structures: BTreeMap::from([(BuildingId::from("power_station"), 1)]),
            ..EngineConfig::default()
        };
        let mut engine = GameEngine::new(test_registry(), TechTree::new(), config).unwrap();
        assert!(engine.perform("set_probe_recycle_target", json!({"zone_id": "earth", "target_percentage": 40})).success);
        assert_eq!(engine.state().probe_recycle_target(&earth()), 0.4);

        let before = zone_mass(&engine.state(), &earth());
        let outcome = engine.perform("recycle_structure", json!({"zone_id": "earth", "building_id": "power_station"}));
        assert!(outcome.success, "{outcome:?}");
        assert!(outcome.metal_kg.unwrap() > 0.0);
        assert_eq!(engine.state().structure_count(&earth(), &building("power_station")), 0);
        assert!((zone_mass(&engine.state(), &earth()) - before).abs() < 1e-9);

        assert!(!engine.perform("recycle_structure", json!({"zone_id": "earth", "building_id": "power_station"})).success);
    }

    // Test 11: Malformed payloads
    #[test]
    fn malformed_payloads() {
        let mut engine = engine();
        let outcome = engine.perform("purchase_probe", json!({"count": 1}));
        assert!(outcome.error.unwrap().starts_with("invalid payload"));
        assert!(!engine.perform_action_json("{not json").success);
        assert!(!engine.perform("purchase_probe", json!([1, 2])).success);
    }

    // Test 12: Typed actions serialize with a type tag
    #[test]
    fn typed_action_json_shape() {
        let action = Action::SetTimeSpeed { speed: 2.0 };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value, json!({"type": "set_time_speed", "speed": 2.0}));
        assert_eq!(parse_action("set_time_speed", json!({"speed": 2.0})).unwrap(), action);
    }
}

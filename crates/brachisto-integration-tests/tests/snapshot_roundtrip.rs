//! Save and restore a game on the built-in data set.

use brachisto_core::transfer::TransferResource;
use brachisto_data::GameData;
use brachisto_engine::{Action, DeserializeError, EngineConfig, GameEngine, read_snapshot_header};
use brachisto_tech_tree::{ResearchCategory, TechTree};
use serde_json::json;

fn running_game(data: &GameData) -> GameEngine {
    let config = EngineConfig {
        initial_probes: 1_000.0,
        initial_metal_kg: 1e6,
        initial_structures: [("mass_driver".into(), 1), ("battery_bank".into(), 1)].into(),
        ..EngineConfig::default()
    };
    let mut engine = GameEngine::from_game_data(data, config).unwrap();
    engine.perform(
        "allocate_probes",
        json!({"zone_id": "earth", "harvest": 0.4, "replicate": 0.4, "construct": 0.2}),
    );
    engine.perform(
        "purchase_structure",
        json!({"zone_id": "earth", "building_id": "power_station", "enabled": true}),
    );
    engine.perform_action(Action::ToggleResearchCategory {
        category: ResearchCategory::Intelligence,
        enabled: true,
    });
    engine.perform_action(Action::CreateTransfer {
        from_zone: "earth".into(),
        to_zone: "mars".into(),
        resource: TransferResource::Probes,
        amount: None,
        rate_percentage: Some(10.0),
    });
    engine.perform_action(Action::CreateTransfer {
        from_zone: "earth".into(),
        to_zone: "venus".into(),
        resource: TransferResource::Metal,
        amount: Some(5_000.0),
        rate_percentage: None,
    });
    engine.run(300);
    engine
}

#[test]
fn restored_game_matches_and_continues() {
    let data = GameData::builtin();
    let mut original = running_game(&data);
    let bytes = original.serialize().unwrap();

    let header = read_snapshot_header(&bytes).unwrap();
    assert_eq!(header.tick, 300);

    let mut restored = GameEngine::deserialize(&bytes, &data).unwrap();
    assert_eq!(restored.time(), original.time());
    assert_eq!(restored.state_hash(), original.state_hash());
    assert_eq!(restored.state().research, original.state().research);
    assert_eq!(restored.state().transfers.len(), original.state().transfers.len());
    assert!(original.state().energy_storage.capacity_wd > 0.0);
    assert_eq!(restored.state().energy_storage, original.state().energy_storage);
    assert_eq!(restored.stats(), original.stats());
    assert_eq!(restored.config(), original.config());

    for _ in 0..100 {
        let a = original.tick();
        let b = restored.tick();
        assert_eq!(a.state_hash, b.state_hash, "diverged at tick {}", a.tick);
    }

    // Actions behave the same on both sides after the restore.
    let id = original.state().transfers.len();
    assert_eq!(id, restored.state().transfers.len());
    let a = original.perform("set_time_speed", json!({"speed": 10}));
    let b = restored.perform("set_time_speed", json!({"speed": 10}));
    assert_eq!(a, b);
    assert_eq!(original.tick().state_hash, restored.tick().state_hash);
}

#[test]
fn restore_against_smaller_tree_drops_progress() {
    let data = GameData::builtin();
    let original = running_game(&data);
    let bytes = original.serialize().unwrap();

    let restored = GameEngine::deserialize_with(&bytes, data.registry.clone(), TechTree::new()).unwrap();
    assert!(restored.state().research.is_empty());
    assert!(restored.tech_tree().enabled_projects().is_empty());
    assert_eq!(restored.time().tick(), 300);
}

#[test]
fn corrupted_snapshot_is_rejected() {
    let data = GameData::builtin();
    let bytes = running_game(&data).serialize().unwrap();
    let truncated = &bytes[..bytes.len() / 2];
    assert!(matches!(
        GameEngine::deserialize(truncated, &data),
        Err(DeserializeError::Decode(_))
    ));
}

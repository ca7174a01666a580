use std::cell::RefCell;
use std::rc::Rc;

use gloom_runtime::audio::AudioLog;
use gloom_runtime::config::RuntimeConfig;
use gloom_runtime::events::LevelEvent;
use gloom_runtime::headless::HeadlessScene;
use gloom_runtime::level::{EntityKind, Level, LevelDocument};
use gloom_runtime::Services;

const WARD: &str = r#"{
    "id": "ward",
    "music": "ward_theme",
    "environment": {"asset_path": "assets/env/ward.glb"},
    "entities": [
        {"type": "npc", "name": "Nurse", "model": "nurse", "position": {"x": 0, "y": 0, "z": 0}},
        {"type": "portal", "position": {"x": 8, "y": 0, "z": 0}, "target_level": "basement"},
        {"type": "prop", "asset_path": "/assets/props/bed.glb", "position": {"x": 1, "y": 2, "z": 3},
         "physics": {"mass": 0}}
    ]
}"#;

fn ward() -> LevelDocument {
    LevelDocument::from_json_str(WARD).expect("ward parses")
}

fn headless(doc: &LevelDocument) -> (Rc<RefCell<HeadlessScene>>, Rc<RefCell<AudioLog>>, Services) {
    let scene = Rc::new(RefCell::new(HeadlessScene::new()));
    scene.borrow_mut().register_placeholders(doc, &RuntimeConfig::default().npc_catalog());
    let audio = Rc::new(RefCell::new(AudioLog::new(64)));
    let services = Services::new(scene.clone(), audio.clone());
    (scene, audio, services)
}

#[test]
fn load_registers_every_entity_under_its_index() {
    let doc = ward();
    let (scene, audio, services) = headless(&doc);
    let mut level = Level::new(doc, services, RuntimeConfig::default());

    let summary = pollster::block_on(level.load()).expect("ward loads");
    assert_eq!(summary.spawned, 3);
    assert_eq!(summary.failed, 0);
    assert!(!summary.cancelled);

    let registry = level.registry();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.object_count(), 3);
    let expected = [EntityKind::Npc, EntityKind::Portal, EntityKind::Prop];
    for (index, kind) in expected.into_iter().enumerate() {
        let node = registry.object(index).expect("registered object");
        let meta = registry.meta(node).expect("object has metadata");
        assert_eq!(meta.index, index);
        assert_eq!(meta.kind, kind);
    }
    assert_eq!(registry.npc_index("Nurse"), Some(0));

    assert!(audio.borrow().is_playing("ward_theme"));
    assert_eq!(level.current_music(), Some("ward_theme"));
    assert_eq!(scene.borrow().atmosphere_applied(), 1);
    let events = level.drain_events();
    assert!(matches!(events.last(), Some(LevelEvent::Loaded { spawned: 3, failed: 0, .. })));
}

#[test]
fn failed_spawns_leave_empty_slots_and_keep_loading() {
    let mut doc = ward();
    let broken = LevelDocument::from_json_str(
        r#"{"id": "x", "entities": [
            {"type": "prop", "asset_path": "/assets/props/missing.glb"},
            {"type": "npc", "name": "Nobody", "model": "unknown_model"}
        ]}"#,
    )
    .expect("fragment parses");
    let (scene, _audio, services) = headless(&doc);
    doc.entities.splice(1..1, broken.entities);
    let mut level = Level::new(doc, services, RuntimeConfig::default());

    let summary = pollster::block_on(level.load()).expect("load tolerates failures");
    assert_eq!(summary.spawned, 3);
    assert_eq!(summary.failed, 2);

    let registry = level.registry();
    assert!(!registry.contains(1));
    assert!(!registry.contains(2));
    assert_eq!(registry.kind_at(3), Some(EntityKind::Portal));
    assert_eq!(registry.kind_at(4), Some(EntityKind::Prop));
    assert!(scene.borrow().loaded_paths().iter().any(|path| path == "/assets/props/missing.glb"));

    let failures: Vec<usize> = level
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            LevelEvent::EntitySpawnFailed { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![1, 2]);
}

#[test]
fn removing_an_entity_reindexes_the_rest() {
    let doc = ward();
    let (scene, _audio, services) = headless(&doc);
    let mut level = Level::new(doc, services, RuntimeConfig::default());
    pollster::block_on(level.load()).expect("ward loads");
    let npc_root = level.registry().object(0).expect("npc root");

    assert!(level.remove_entity_live(0));
    assert!(!scene.borrow().is_alive(npc_root));

    let registry = level.registry();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.object_count(), 2);
    assert_eq!(registry.kind_at(0), Some(EntityKind::Portal));
    assert_eq!(registry.kind_at(1), Some(EntityKind::Prop));
    let prop_root = registry.object(1).expect("prop moved down");
    assert_eq!(registry.meta(prop_root).map(|meta| meta.index), Some(1));
    assert_eq!(registry.npc_index("Nurse"), None);
    assert_eq!(level.document().entities.len(), 2);

    assert!(!level.remove_entity_live(5), "out of range removal is a no-op");
}

#[test]
fn dispose_is_idempotent() {
    let doc = ward();
    let (scene, audio, services) = headless(&doc);
    let mut level = Level::new(doc, services, RuntimeConfig::default());
    pollster::block_on(level.load()).expect("ward loads");
    level.start();
    let roots: Vec<_> = (0..3).filter_map(|index| level.registry().object(index)).collect();

    level.dispose();
    level.dispose();

    assert!(level.is_disposed());
    assert!(level.registry().is_empty());
    let scene = scene.borrow();
    for root in roots {
        assert!(!scene.is_alive(root));
        assert_eq!(scene.dispose_calls(root), 1);
    }
    assert_eq!(scene.total_light_disposals(), 1, "one portal light, released once");
    assert!(scene.active_bodies().is_empty());
    assert!(!audio.borrow().is_playing("ward_theme"));
    assert!(pollster::block_on(level.load()).is_err(), "a disposed level cannot load again");
}

#[test]
fn npc_animations_resolve_by_exact_folded_and_partial_name() {
    let doc = ward();
    let (scene, _audio, services) = headless(&doc);
    let mut level = Level::new(doc, services, RuntimeConfig::default());
    pollster::block_on(level.load()).expect("ward loads");

    assert_eq!(level.get_entity_animation_names(0), vec!["Walk", "Idle", "Talk"]);
    assert_eq!(scene.borrow().playing_animations(), vec!["Idle"]);

    assert!(level.play_entity_animation(0, "talk"));
    assert_eq!(scene.borrow().playing_animations(), vec!["Talk"]);
    assert!(level.play_entity_animation(0, "wal"));
    assert_eq!(scene.borrow().playing_animations(), vec!["Walk"]);
    assert!(!level.play_entity_animation(0, "dance"));
    assert_eq!(scene.borrow().playing_animations(), vec!["Walk"]);

    assert!(!level.play_entity_animation(1, "Idle"), "portals have no animations");
    assert!(level.get_entity_animation_names(2).is_empty());
}

#[test]
fn cancelling_mid_load_tears_down_partial_work() {
    let doc = ward();
    let (scene, _audio, services) = headless(&doc);
    let mut level = Level::new(doc, services, RuntimeConfig::default());
    scene.borrow_mut().cancel_on_load("/assets/props/bed.glb", level.cancel_token());

    let summary = pollster::block_on(level.load()).expect("cancelled load still returns");
    assert!(summary.cancelled);
    assert_eq!(summary.spawned, 2);
    assert!(level.is_disposed());
    assert!(level.registry().is_empty());

    let scene = scene.borrow();
    assert!(scene.live_roots_from("/assets/props/bed.glb").is_empty());
    assert!(scene.live_roots_from("/assets/characters/nurse.glb").is_empty());
    assert!(scene.live_roots_from("/assets/env/ward.glb").is_empty());
}

#[test]
fn unnamed_npcs_follow_their_slot_after_a_shift() {
    let doc = LevelDocument::from_json_str(
        r#"{"id": "ward", "entities": [
            {"type": "npc", "model": "nurse"},
            {"type": "npc", "model": "nurse", "position": {"x": 4, "y": 0, "z": 0}}
        ]}"#,
    )
    .expect("ward parses");
    let unnamed = doc.entities[0].clone();
    let (_scene, _audio, services) = headless(&doc);
    let mut level = Level::new(doc, services, RuntimeConfig::default());
    pollster::block_on(level.load()).expect("ward loads");
    assert_eq!(level.registry().npc_index("npc_1"), Some(1));

    assert!(level.remove_entity_live(0));
    assert_eq!(level.registry().npc(0).map(|npc| npc.name()), Some("npc_0"));
    assert_eq!(level.registry().npc_index("npc_1"), None);

    pollster::block_on(level.add_entity_live(1, unnamed)).expect("nurse added");
    assert_eq!(level.registry().npc_index("npc_0"), Some(0));
    assert_eq!(level.registry().npc_index("npc_1"), Some(1));
}

#[test]
fn environment_receives_shadows_and_collides_only_where_it_has_geometry() {
    let doc = ward();
    let (scene, _audio, services) = headless(&doc);
    scene.borrow_mut().register_asset("assets/env/ward.glb", &[4096, 0, 128], &[]);
    let mut level = Level::new(doc, services, RuntimeConfig::default());
    pollster::block_on(level.load()).expect("ward loads");

    let scene = scene.borrow();
    let roots = scene.live_roots_from("/assets/env/ward.glb");
    assert_eq!(roots.len(), 1);
    let meshes = scene.children_of(roots[0]);
    assert_eq!(meshes.len(), 3);
    for mesh in &meshes {
        assert!(scene.node(*mesh).expect("sub-mesh").receive_shadows);
    }

    let env_bodies: Vec<_> =
        scene.active_bodies().into_iter().filter(|body| body.nodes.iter().any(|node| meshes.contains(node))).collect();
    assert_eq!(env_bodies.len(), 2, "the empty sub-mesh gets no body");
    assert!(env_bodies.iter().all(|body| body.mass == 0.0 && body.nodes.len() == 1));
    assert!(env_bodies.iter().all(|body| body.nodes[0] != meshes[1]));
}

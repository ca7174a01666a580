use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use gloom_runtime::audio::AudioLog;
use gloom_runtime::config::RuntimeConfig;
use gloom_runtime::events::LevelEvent;
use gloom_runtime::headless::HeadlessScene;
use gloom_runtime::{LevelDocument, LevelManager, Services};

const WARD: &str = r#"{
    "id": "ward",
    "music": "ward_theme",
    "entities": [
        {"type": "npc", "name": "Nurse", "model": "nurse"},
        {"type": "portal", "position": {"x": 8, "y": 0, "z": 0}, "target_level": "basement"}
    ]
}"#;

const BASEMENT: &str = r#"{
    "id": "basement",
    "music": "drip",
    "player_start": {"x": 0, "y": 0, "z": -5},
    "entities": [
        {"type": "prop", "asset_path": "/assets/props/boiler.glb", "physics": {"mass": 40, "shape": "box"}}
    ]
}"#;

fn manager() -> (Rc<RefCell<HeadlessScene>>, Rc<RefCell<AudioLog>>, LevelManager) {
    let scene = Rc::new(RefCell::new(HeadlessScene::new()));
    let audio = Rc::new(RefCell::new(AudioLog::new(64)));
    let config = RuntimeConfig::default();
    let catalog = config.npc_catalog();
    let mut manager = LevelManager::new(Services::new(scene.clone(), audio.clone()), config);
    for json in [WARD, BASEMENT] {
        let doc = LevelDocument::from_json_str(json).expect("level parses");
        scene.borrow_mut().register_placeholders(&doc, &catalog);
        manager.register(doc);
    }
    (scene, audio, manager)
}

#[test]
fn clicking_a_portal_moves_to_its_target_level() {
    let (scene, audio, mut manager) = manager();
    let summary = pollster::block_on(manager.load_level("ward")).expect("ward loads").expect("ward registered");
    assert_eq!(summary.spawned, 2);
    let portal_root = manager.current().and_then(|level| level.registry().object(1)).expect("portal spawned");

    manager.current_mut().expect("ward running").handle_pointer(Some(portal_root));
    let events = manager.update(1.0 / 60.0);
    assert!(events.iter().any(|event| matches!(event, LevelEvent::TransitionRequested { target } if target == "basement")));
    assert_eq!(manager.pending_transition(), Some("basement"));
    assert_eq!(audio.borrow().play_count("teleport"), 1);

    pollster::block_on(manager.process_transitions()).expect("basement loads");
    let level = manager.current().expect("basement running");
    assert_eq!(level.id(), "basement");
    assert!(level.is_running());
    assert_eq!(level.player().position.z, -5.0);
    assert_eq!(manager.pending_transition(), None);
    assert!(!scene.borrow().is_alive(portal_root));
    assert!(!audio.borrow().is_playing("ward_theme"));
    assert!(audio.borrow().is_playing("drip"));

    let body = level.registry().prop(0).expect("boiler").bodies();
    assert_eq!(body.len(), 1, "dynamic props get one compound body");
}

#[test]
fn unknown_level_leaves_the_current_one_running() {
    let (_scene, _audio, mut manager) = manager();
    pollster::block_on(manager.load_level("ward")).expect("ward loads");

    let outcome = pollster::block_on(manager.load_level("attic")).expect("missing level is not an error");
    assert!(outcome.is_none());
    assert_eq!(manager.current().map(|level| level.id()), Some("ward"));
}

#[test]
fn hot_update_only_restarts_music_when_it_changes() {
    let (scene, audio, mut manager) = manager();
    pollster::block_on(manager.load_level("ward")).expect("ward loads");
    let applied_before = scene.borrow().atmosphere_applied();

    let mut doc = manager.document("ward").cloned().expect("ward registered");
    doc.settings.fog.enabled = true;
    assert!(manager.hot_update_current(doc.clone()));
    assert_eq!(audio.borrow().play_count("ward_theme"), 1, "same music keeps playing");
    assert_eq!(scene.borrow().atmosphere_applied(), applied_before + 1);
    assert!(scene.borrow().last_settings().expect("settings applied").fog.enabled);

    doc.music = Some("storm".into());
    assert!(manager.hot_update_current(doc));
    assert!(audio.borrow().is_playing("storm"));
    assert!(!audio.borrow().is_playing("ward_theme"));
    let level = manager.current_mut().expect("ward running");
    assert_eq!(level.current_music(), Some("storm"));
    let music_flags: Vec<bool> = level
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            LevelEvent::HotUpdated { music_changed, .. } => Some(music_changed),
            _ => None,
        })
        .collect();
    assert_eq!(music_flags, vec![false, true]);

    let basement = manager.document("basement").cloned().expect("basement registered");
    assert!(!manager.hot_update_current(basement), "documents for other levels are only stored");
}

#[test]
fn documents_round_trip_through_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ward = LevelDocument::from_json_str(WARD).expect("ward parses");
    ward.save_to_path(dir.path().join("ward.json")).expect("save ward");
    fs::write(dir.path().join("broken.json"), "{ not json").expect("write broken file");
    fs::write(dir.path().join("notes.txt"), "ignored").expect("write notes");

    let (_scene, _audio, mut manager) = manager();
    let loaded = manager.load_dir(dir.path()).expect("directory scans");
    assert_eq!(loaded, 1, "broken and non-json files are skipped");
    assert_eq!(manager.source_path("ward"), Some(dir.path().join("ward.json").as_path()));
    assert_eq!(manager.document("ward"), Some(&ward));

    pollster::block_on(manager.load_level("ward")).expect("ward loads");
    let mut edited = ward.clone();
    edited.music = Some("lullaby".into());
    edited.save_to_path(dir.path().join("ward.json")).expect("save edit");
    assert!(manager.reload_from_disk("ward").expect("reload reads the file"));
    assert_eq!(manager.current().and_then(|level| level.current_music()), Some("lullaby"));

    assert!(manager.reload_from_disk("basement").is_err(), "levels registered in memory have no source file");
}

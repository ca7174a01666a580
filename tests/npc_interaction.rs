use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use gloom_runtime::audio::AudioLog;
use gloom_runtime::config::RuntimeConfig;
use gloom_runtime::dialogue::DialogueEvent;
use gloom_runtime::events::LevelEvent;
use gloom_runtime::headless::HeadlessScene;
use gloom_runtime::level::{Level, LevelDocument};
use gloom_runtime::Services;

const DT: f32 = 1.0 / 60.0;

struct Fixture {
    scene: Rc<RefCell<HeadlessScene>>,
    audio: Rc<RefCell<AudioLog>>,
    services: Services,
    level: Level,
}

fn start(json: &str) -> Fixture {
    let doc = LevelDocument::from_json_str(json).expect("level parses");
    let scene = Rc::new(RefCell::new(HeadlessScene::new()));
    scene.borrow_mut().register_placeholders(&doc, &RuntimeConfig::default().npc_catalog());
    let audio = Rc::new(RefCell::new(AudioLog::new(64)));
    let services = Services::new(scene.clone(), audio.clone());
    let config = RuntimeConfig { rng_seed: Some(7), ..RuntimeConfig::default() };
    let mut level = Level::new(doc, services.clone(), config);
    pollster::block_on(level.load()).expect("level loads");
    level.start();
    level.drain_events();
    Fixture { scene, audio, services, level }
}

fn step_to(fixture: &mut Fixture, x: f32) -> Vec<LevelEvent> {
    fixture.level.set_player_position(Vec3::new(x, 0.0, 0.0));
    fixture.level.update(DT);
    fixture.level.drain_events()
}

fn interactions(events: &[LevelEvent]) -> usize {
    events.iter().filter(|event| matches!(event, LevelEvent::NpcInteraction { .. })).count()
}

fn started_text(events: &[LevelEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        LevelEvent::Dialogue(DialogueEvent::Started { lines, .. }) => lines.first().map(|line| line.text.clone()),
        _ => None,
    })
}

fn finish_dialogue(fixture: &mut Fixture) {
    while fixture.services.dialogue.borrow().is_active() {
        fixture.services.dialogue.borrow_mut().advance();
    }
    fixture.level.update(DT);
}

const GATEKEEPER: &str = r#"{
    "id": "ward",
    "entities": [
        {"type": "npc", "name": "Nurse", "model": "nurse",
         "requirements": ["key"], "rewards": ["badge"],
         "success_dialogue": ["You found it."], "fail_dialogue": ["Bring me the key."]}
    ]
}"#;

#[test]
fn npc_fires_once_per_visit() {
    let mut fixture = start(GATEKEEPER);

    assert_eq!(interactions(&step_to(&mut fixture, 10.0)), 0);

    let events = step_to(&mut fixture, 2.0);
    assert_eq!(interactions(&events), 1);
    assert_eq!(started_text(&events).as_deref(), Some("Bring me the key."));
    assert_eq!(fixture.scene.borrow().playing_animations(), vec!["Talk"]);

    finish_dialogue(&mut fixture);
    assert_eq!(fixture.scene.borrow().playing_animations(), vec!["Idle"], "back to idle once the talk ends");
    for _ in 0..5 {
        assert_eq!(interactions(&step_to(&mut fixture, 1.5)), 0, "no re-trigger while still in range");
    }

    assert_eq!(interactions(&step_to(&mut fixture, 10.0)), 0);
    assert_eq!(interactions(&step_to(&mut fixture, 2.0)), 1, "leaving the radius re-arms the npc");
}

#[test]
fn met_requirements_grant_rewards_without_consuming() {
    let mut fixture = start(GATEKEEPER);
    fixture.services.dialogue.borrow_mut().vars_mut().add_item("key", 1);

    let events = step_to(&mut fixture, 1.0);
    assert_eq!(started_text(&events).as_deref(), Some("You found it."));
    assert!(events
        .iter()
        .any(|event| matches!(event, LevelEvent::Dialogue(DialogueEvent::Reward { item, amount: 1 }) if item == "badge")));

    let dialogue = fixture.services.dialogue.borrow();
    assert_eq!(dialogue.vars().inventory_count("badge"), 1);
    assert_eq!(dialogue.vars().inventory_count("key"), 1);
}

#[test]
fn once_trigger_fires_a_single_time() {
    let mut fixture = start(
        r#"{
            "id": "ward",
            "entities": [{"type": "npc", "name": "Nurse", "model": "nurse", "position": {"x": 0, "y": 0, "z": 0}}],
            "dialogues": [{"id": "whisper", "lines": ["Did you hear that?"]}],
            "triggers": [{"id": "scare", "target": "Nurse", "radius": 4,
                          "actions": [{"type": "sound", "key": "scream"},
                                      {"type": "light", "intensity": 0.2},
                                      {"type": "dialogue", "id": "whisper"}]}]
        }"#,
    );

    let events = step_to(&mut fixture, 3.5);
    assert!(events.iter().any(|event| matches!(event, LevelEvent::TriggerFired { id } if id == "scare")));
    assert_eq!(started_text(&events).as_deref(), Some("Did you hear that?"));
    assert_eq!(fixture.audio.borrow().play_count("scream"), 1);
    assert_eq!(fixture.level.player().spotlight_intensity, 0.2);
    assert!(fixture.level.triggers().is_triggered("scare"));

    finish_dialogue(&mut fixture);
    step_to(&mut fixture, 20.0);
    let events = step_to(&mut fixture, 3.5);
    assert!(!events.iter().any(|event| matches!(event, LevelEvent::TriggerFired { .. })));
    assert_eq!(fixture.audio.borrow().play_count("scream"), 1);
}

#[test]
fn quest_walk_folds_lines_then_branches() {
    let mut fixture = start(
        r#"{
            "id": "ward",
            "entities": [{"type": "npc", "name": "Caretaker", "model": "caretaker",
                "quest": {
                    "nodes": [
                        {"id": 1, "type": "Start"},
                        {"id": 2, "type": "Say", "properties": {"speaker": "Caretaker", "text": "A"}},
                        {"id": 3, "type": "Say", "properties": {"text": "B"}},
                        {"id": 4, "type": "Choice", "properties": {"options": ["X", "Y"]}},
                        {"id": 5, "type": "End"},
                        {"id": 6, "type": "End"}
                    ],
                    "links": [[1, 1, 0, 2, 0], [2, 2, 0, 3, 0], [3, 3, 0, 4, 0], [4, 4, 0, 5, 0], [5, 4, 1, 6, 0]]
                }}]
        }"#,
    );

    let events = step_to(&mut fixture, 0.5);
    assert_eq!(interactions(&events), 1);
    let lines: Vec<String> = events
        .iter()
        .find_map(|event| match event {
            LevelEvent::Dialogue(DialogueEvent::Started { lines, .. }) => {
                Some(lines.iter().map(|line| line.text.clone()).collect())
            }
            _ => None,
        })
        .expect("quest opened with lines");
    assert_eq!(lines, vec!["A", "B"]);

    {
        let mut dialogue = fixture.services.dialogue.borrow_mut();
        assert_eq!(dialogue.current_line().and_then(|line| line.speaker.as_deref()), Some("Caretaker"));
        dialogue.advance();
        dialogue.advance();
        assert_eq!(dialogue.current_choices(), ["X".to_string(), "Y".to_string()]);
        assert!(!dialogue.choose(2), "out of range choices are rejected");
        assert!(dialogue.choose(1));
        assert!(!dialogue.is_active());
    }

    fixture.level.update(DT);
    let visited = fixture
        .level
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            LevelEvent::Dialogue(DialogueEvent::QuestFinished { visited, owner }) => {
                assert_eq!(owner.as_deref(), Some("Caretaker"));
                Some(visited)
            }
            _ => None,
        })
        .expect("quest finished");
    assert_eq!(visited, vec![1, 2, 3, 4, 6]);
}

#[test]
fn effects_drive_the_presentation() {
    let mut fixture = start(
        r#"{
            "id": "ward",
            "effects": [
                {"type": "flicker", "low": [0.3, 0.1], "high": [0.9, 0.9], "chance": 0.0},
                {"type": "heartbeat", "base": 1.5, "amplitude": 0.0}
            ]
        }"#,
    );
    step_to(&mut fixture, 0.0);
    fixture.level.render();

    let scene = fixture.scene.borrow();
    let presentation = scene.last_presentation().expect("presented");
    assert!((presentation.spotlight_intensity - 0.9).abs() < 1e-6, "chance 0 always picks the high range");
    assert!((presentation.vignette_weight - 1.5).abs() < 1e-6);
    assert_eq!(scene.frames_rendered(), 1);
}

#[test]
fn quest_without_lines_replaces_the_requirements_fallback() {
    let mut fixture = start(
        r#"{
            "id": "ward",
            "entities": [{"type": "npc", "name": "Caretaker", "model": "caretaker",
                "rewards": ["badge"], "success_dialogue": ["fallback line"],
                "quest": {
                    "nodes": [
                        {"id": 1, "type": "Start"},
                        {"id": 2, "type": "Give", "properties": {"item": "lantern"}},
                        {"id": 3, "type": "End"}
                    ],
                    "links": [[1, 1, 0, 2, 0], [2, 2, 0, 3, 0]]
                }}]
        }"#,
    );

    let events = step_to(&mut fixture, 0.5);
    assert_eq!(interactions(&events), 1);
    assert_eq!(started_text(&events), None, "no fallback dialogue on top of the quest");
    assert!(events
        .iter()
        .any(|event| matches!(event, LevelEvent::Dialogue(DialogueEvent::QuestFinished { visited, .. }) if visited == &vec![1, 2, 3])));
    {
        let dialogue = fixture.services.dialogue.borrow();
        assert_eq!(dialogue.vars().inventory_count("lantern"), 1);
        assert_eq!(dialogue.vars().inventory_count("badge"), 0);
        assert!(!dialogue.is_active());
    }
    assert_eq!(fixture.scene.borrow().playing_animations(), vec!["Idle"]);
}

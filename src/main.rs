use std::cell::RefCell;
use std::process;
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::Vec3;
use gloom_runtime::audio::AudioLog;
use gloom_runtime::cli::RunnerArgs;
use gloom_runtime::config::RuntimeConfig;
use gloom_runtime::events::LevelEvent;
use gloom_runtime::headless::HeadlessScene;
use gloom_runtime::level::{EditorCallbacks, EntityKind};
use gloom_runtime::watch::LevelHotReload;
use gloom_runtime::{LevelManager, Services};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const WALK_SPEED_UNITS_PER_SECOND: f32 = 2.0;
const WAYPOINT_ARRIVAL_THRESHOLD: f32 = 0.25;
const DIALOGUE_ADVANCE_FRAMES: u32 = 30;

fn main() {
    let args = match RunnerArgs::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            process::exit(2);
        }
    };
    let mut config = match args.config() {
        Some(path) => RuntimeConfig::load_or_default(path),
        None => RuntimeConfig::default(),
    };
    config.apply_overrides(&args.config_overrides());
    init_tracing(config.log_filter.as_deref());

    if let Err(err) = pollster::block_on(run(&args, config)) {
        error!("runner error: {err:?}");
        process::exit(1);
    }
}

fn init_tracing(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

async fn run(args: &RunnerArgs, config: RuntimeConfig) -> Result<()> {
    let level_path = args.level().context("--level <path> is required")?.clone();
    let scene = Rc::new(RefCell::new(HeadlessScene::new()));
    let audio = Rc::new(RefCell::new(AudioLog::new(512)));
    let services = Services::new(scene.clone(), audio.clone());
    let catalog = config.npc_catalog();
    let mut manager = LevelManager::new(services.clone(), config);

    if let Some(dir) = level_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(err) = manager.load_dir(dir) {
            warn!("could not scan sibling levels: {err:#}");
        }
    }
    let start_id = manager.register_file(&level_path)?;
    for doc in manager.documents() {
        scene.borrow_mut().register_placeholders(doc, &catalog);
    }

    let mut watcher = if args.watch() {
        let mut watcher = LevelHotReload::new()?;
        watcher.watch(&start_id, &level_path)?;
        Some(watcher)
    } else {
        None
    };

    manager.load_level(&start_id).await?;
    if args.editor() {
        if let Some(level) = manager.current_mut() {
            level.enable_editor_mode(EditorCallbacks::new(
                |selection| info!(selection = selection.label(), index = selection.index(), "editor select"),
                |index, transform| info!(index, position = ?transform.position, "editor transform"),
            ));
        }
    }

    let dt = args.dt();
    let mut event_count = 0usize;
    let mut waypoint = 0usize;
    for frame in 0..args.frames() {
        if let Some(watcher) = watcher.as_mut() {
            for id in watcher.drain_changed() {
                match manager.reload_from_disk(&id) {
                    Ok(applied) => info!(level = %id, applied, "level file changed"),
                    Err(err) => warn!(level = %id, "hot reload failed: {err:#}"),
                }
            }
        }

        if let Some(level) = manager.current_mut() {
            let targets: Vec<Vec3> = level.document().entities.iter().map(|spawn| spawn.position()).collect();
            if let Some(&target) = targets.get(waypoint) {
                let position = level.player().position;
                let offset = target - position;
                if offset.length() <= WAYPOINT_ARRIVAL_THRESHOLD {
                    if level.registry().kind_at(waypoint) == Some(EntityKind::Portal) {
                        let picked = level.registry().object(waypoint);
                        level.handle_pointer(picked);
                    }
                    waypoint += 1;
                } else {
                    let step = offset.clamp_length_max(WALK_SPEED_UNITS_PER_SECOND * dt);
                    level.set_player_position(position + step);
                }
            }
        }

        if frame % DIALOGUE_ADVANCE_FRAMES == 0 {
            let mut dialogue = services.dialogue.borrow_mut();
            if !dialogue.current_choices().is_empty() {
                dialogue.choose(0);
            } else if dialogue.is_active() {
                dialogue.advance();
            }
        }

        for event in manager.update(dt) {
            event_count += 1;
            info!(frame, "{event}");
            if let LevelEvent::TransitionRequested { .. } = event {
                waypoint = 0;
            }
        }
        manager.render();
        if manager.pending_transition().is_some() {
            manager.process_transitions().await?;
        }
    }

    let frames_rendered = scene.borrow().frames_rendered();
    let sounds = audio.borrow().recent_commands().len();
    match manager.current() {
        Some(level) => println!(
            "level '{}': {} live entities, {} events, {} frames rendered, {} audio commands",
            level.id(),
            level.registry().len(),
            event_count,
            frames_rendered,
            sounds,
        ),
        None => println!("no level running after {} frames", args.frames()),
    }
    manager.dispose();
    Ok(())
}

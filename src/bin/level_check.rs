use anyhow::{anyhow, bail, Context, Result};
use gloom_runtime::audio::AudioLog;
use gloom_runtime::catalog::NpcCatalog;
use gloom_runtime::config::RuntimeConfig;
use gloom_runtime::headless::HeadlessScene;
use gloom_runtime::level::document::TriggerAction;
use gloom_runtime::level::{EntitySpawn, Level, LevelDocument};
use gloom_runtime::Services;
use std::cell::RefCell;
use std::collections::HashSet;
use std::env;
use std::process;
use std::rc::Rc;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "validate" => {
            let path = args.next().ok_or_else(|| anyhow!("validate requires a path: level_check validate <level>"))?;
            cmd_validate(&path)
        }
        "list" => {
            let path = args.next().ok_or_else(|| anyhow!("list requires a path: level_check list <level>"))?;
            cmd_list(&path)
        }
        "dry-run" => {
            let path = args.next().ok_or_else(|| anyhow!("dry-run requires a path: level_check dry-run <level>"))?;
            cmd_dry_run(&path)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Level Check

Usage:
  level_check validate <level_path>   Check triggers, dialogue references, quests and NPC models
  level_check list <level_path>       List entities with their runtime indices
  level_check dry-run <level_path>    Load the level against placeholder assets and report
  level_check help                    Show this message
"
    );
}

fn load_level(path: &str) -> Result<LevelDocument> {
    LevelDocument::load_from_path(path).with_context(|| format!("loading level '{path}'"))
}

fn cmd_validate(path: &str) -> Result<()> {
    let doc = load_level(path)?;
    let issues = validate(&doc, &RuntimeConfig::default().npc_catalog());
    if issues.is_empty() {
        println!("Level '{}' OK ({} entities, {} triggers)", doc.id, doc.entities.len(), doc.triggers.len());
        return Ok(());
    }
    for issue in &issues {
        eprintln!("- {issue}");
    }
    bail!("{} issue(s) found in '{path}'", issues.len())
}

fn validate(doc: &LevelDocument, catalog: &NpcCatalog) -> Vec<String> {
    let mut issues = Vec::new();
    let dialogue_ids: HashSet<&str> = doc.dialogues.iter().map(|dialogue| dialogue.id.as_str()).collect();
    if dialogue_ids.len() != doc.dialogues.len() {
        issues.push("duplicate dialogue ids".to_string());
    }
    let npc_names: HashSet<String> = doc.npc_names().map(|(_, name)| name).collect();

    for (index, spawn) in doc.entities.iter().enumerate() {
        match spawn {
            EntitySpawn::Npc(npc) => {
                if catalog.resolve(npc.model.as_deref(), npc.asset_path.as_deref()).is_none() {
                    issues.push(format!(
                        "entity {index}: npc model {:?} / asset {:?} does not resolve",
                        npc.model, npc.asset_path
                    ));
                }
                if let Some(quest) = npc.quest.as_ref() {
                    for problem in quest.validate() {
                        issues.push(format!("entity {index}: quest {problem}"));
                    }
                }
            }
            EntitySpawn::Portal(portal) => {
                if portal.target_level.trim().is_empty() {
                    issues.push(format!("entity {index}: portal has no target level"));
                }
            }
            EntitySpawn::Prop(prop) => {
                if prop.asset_path.trim().is_empty() {
                    issues.push(format!("entity {index}: prop has no asset path"));
                }
            }
        }
    }

    let mut trigger_ids = HashSet::new();
    for trigger in &doc.triggers {
        if !trigger_ids.insert(trigger.id.as_str()) {
            issues.push(format!("duplicate trigger id '{}'", trigger.id));
        }
        if !npc_names.contains(&trigger.target) {
            issues.push(format!("trigger '{}' targets unknown npc '{}'", trigger.id, trigger.target));
        }
        for action in &trigger.actions {
            if let TriggerAction::Dialogue { id } = action {
                if !dialogue_ids.contains(id.as_str()) {
                    issues.push(format!("trigger '{}' plays unknown dialogue '{id}'", trigger.id));
                }
            }
        }
    }
    issues
}

fn cmd_list(path: &str) -> Result<()> {
    let doc = load_level(path)?;
    println!("{} ({}): {} entities", doc.id, doc.name, doc.entities.len());
    for (index, spawn) in doc.entities.iter().enumerate() {
        let position = spawn.position();
        let detail = match spawn {
            EntitySpawn::Npc(npc) => npc.display_name(index),
            EntitySpawn::Portal(portal) => format!("-> {}", portal.target_level),
            EntitySpawn::Prop(prop) => prop.asset_path.clone(),
        };
        println!(
            "{index:>4}  {:<6}  ({:.2}, {:.2}, {:.2})  {detail}",
            spawn.kind().label(),
            position.x,
            position.y,
            position.z
        );
    }
    Ok(())
}

fn cmd_dry_run(path: &str) -> Result<()> {
    let doc = load_level(path)?;
    let config = RuntimeConfig::default();
    let scene = Rc::new(RefCell::new(HeadlessScene::new()));
    scene.borrow_mut().register_placeholders(&doc, &config.npc_catalog());
    let services = Services::new(scene.clone(), Rc::new(RefCell::new(AudioLog::new(64))));
    let mut level = Level::new(doc, services, config);
    let summary = pollster::block_on(level.load())?;
    println!(
        "Level '{}' loaded: {} spawned, {} failed, {} live objects",
        level.id(),
        summary.spawned,
        summary.failed,
        level.registry().object_count()
    );
    level.dispose();
    Ok(())
}

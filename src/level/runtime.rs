use anyhow::{ensure, Result};
use glam::Vec3;
use tracing::{debug, info, warn};

use super::effects::EffectStack;
use super::editor::EditorSession;
use super::registry::{EntityRegistry, LiveEntity};
use super::triggers::TriggerBook;
use crate::catalog::normalize_asset_path;
use crate::config::RuntimeConfig;
use crate::dialogue::DialogueEvent;
use crate::entity::{load_bundle, EntityFactory, SpawnError};
use crate::events::{EventBus, LevelEvent};
use crate::level::document::{EntitySpawn, LevelDocument};
use crate::scene::{BodyHandle, NodeId, Presentation, Transform3D};
use crate::services::{LoadCancel, Services};
use crate::time::SceneClock;

/// Player-facing values the level owns and pushes to the backend every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Vec3,
    pub spotlight_intensity: f32,
    pub camera_jitter: Vec3,
    pub vignette_weight: f32,
    pub physics_enabled: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            spotlight_intensity: 1.0,
            camera_jitter: Vec3::ZERO,
            vignette_weight: 1.5,
            physics_enabled: true,
        }
    }
}

impl PlayerState {
    pub fn presentation(&self) -> Presentation {
        Presentation {
            spotlight_intensity: self.spotlight_intensity,
            camera_jitter: self.camera_jitter,
            vignette_weight: self.vignette_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub spawned: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelPhase {
    Created,
    Loaded,
    Running,
    Disposed,
}

pub(super) struct EnvironmentInstance {
    pub(super) root: NodeId,
    pub(super) bodies: Vec<BodyHandle>,
}

/// One loaded level: its document, live entities, triggers, effects and editor session.
pub struct Level {
    pub(super) doc: LevelDocument,
    pub(super) services: Services,
    pub(super) config: RuntimeConfig,
    pub(super) factory: EntityFactory,
    pub(super) registry: EntityRegistry,
    pub(super) environment: Option<EnvironmentInstance>,
    pub(super) triggers: TriggerBook,
    pub(super) effects: EffectStack,
    pub(super) player: PlayerState,
    pub(super) clock: SceneClock,
    pub(super) editor: Option<EditorSession>,
    pub(super) events: EventBus,
    pub(super) cancel: LoadCancel,
    pub(super) current_music: Option<String>,
    pub(super) talking_npc: Option<usize>,
    phase: LevelPhase,
}

impl Level {
    pub fn new(doc: LevelDocument, services: Services, config: RuntimeConfig) -> Self {
        let factory = EntityFactory::new(config.npc_catalog(), config.portal);
        let effects = EffectStack::new(doc.effects.clone(), config.rng_seed);
        let player = PlayerState {
            spotlight_intensity: config.player.spotlight_intensity,
            vignette_weight: config.player.vignette_weight,
            ..PlayerState::default()
        };
        Self {
            doc,
            services,
            config,
            factory,
            registry: EntityRegistry::new(),
            environment: None,
            triggers: TriggerBook::default(),
            effects,
            player,
            clock: SceneClock::new(),
            editor: None,
            events: EventBus::default(),
            cancel: LoadCancel::new(),
            current_music: None,
            talking_npc: None,
            phase: LevelPhase::Created,
        }
    }

    pub fn id(&self) -> &str {
        &self.doc.id
    }

    pub fn document(&self) -> &LevelDocument {
        &self.doc
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn triggers(&self) -> &TriggerBook {
        &self.triggers
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn set_player_position(&mut self, position: Vec3) {
        self.player.position = position;
    }

    pub fn clock_mut(&mut self) -> &mut SceneClock {
        &mut self.clock
    }

    pub fn scene_time(&self) -> f32 {
        self.clock.elapsed_seconds()
    }

    pub fn current_music(&self) -> Option<&str> {
        self.current_music.as_deref()
    }

    pub fn is_disposed(&self) -> bool {
        self.phase == LevelPhase::Disposed
    }

    pub fn is_running(&self) -> bool {
        self.phase == LevelPhase::Running
    }

    /// Token that aborts an in-flight `load`; whatever was spawned is torn down.
    pub fn cancel_token(&self) -> LoadCancel {
        self.cancel.clone()
    }

    pub fn drain_events(&mut self) -> Vec<LevelEvent> {
        self.events.drain()
    }

    /// Materialize the environment and every entity. Individual spawn failures are logged
    /// and skipped.
    pub async fn load(&mut self) -> Result<LoadSummary> {
        ensure!(self.phase != LevelPhase::Disposed, "level '{}' was disposed", self.doc.id);
        ensure!(self.phase == LevelPhase::Created, "level '{}' is already loaded", self.doc.id);
        info!(level = %self.doc.id, entities = self.doc.entities.len(), "loading level");

        {
            let mut audio = self.services.audio.borrow_mut();
            audio.stop_all();
            if let Some(music) = self.doc.music.as_deref() {
                audio.play(music, true, Some(self.config.audio.music_volume));
            }
        }
        self.current_music = self.doc.music.clone();
        self.services.scene.borrow_mut().apply_atmosphere(&self.doc.settings);
        self.load_environment().await;

        let mut summary = LoadSummary::default();
        for index in 0..self.doc.entities.len() {
            if self.cancel.is_cancelled() {
                break;
            }
            let spawn = self.doc.entities[index].clone();
            match self.spawn_at(index, &spawn).await {
                Ok(_) => summary.spawned += 1,
                Err(SpawnError::Cancelled { .. }) => break,
                Err(err) => {
                    summary.failed += 1;
                    let reason = format!("{:#}", anyhow::Error::new(err));
                    warn!(level = %self.doc.id, index, kind = spawn.kind().label(), %reason, "entity spawn failed");
                    self.events.push(LevelEvent::EntitySpawnFailed { index, kind: spawn.kind(), reason });
                }
            }
        }

        if self.cancel.is_cancelled() {
            debug!(level = %self.doc.id, "load cancelled; tearing down partial level");
            summary.cancelled = true;
            self.dispose();
            return Ok(summary);
        }

        {
            let mut dialogue = self.services.dialogue.borrow_mut();
            for entry in &self.doc.dialogues {
                dialogue.register(entry.clone());
            }
        }
        self.triggers.arm(&self.doc.triggers);
        self.phase = LevelPhase::Loaded;
        info!(level = %self.doc.id, spawned = summary.spawned, failed = summary.failed, "level loaded");
        self.events.push(LevelEvent::Loaded {
            level: self.doc.id.clone(),
            spawned: summary.spawned,
            failed: summary.failed,
        });
        Ok(summary)
    }

    async fn load_environment(&mut self) {
        let Some(env) = self.doc.environment.clone() else {
            return;
        };
        let Some(path) = normalize_asset_path(&env.asset_path) else {
            warn!(level = %self.doc.id, asset = %env.asset_path, "environment asset path is empty");
            return;
        };
        let bundle = match load_bundle(&self.services.scene, &path, &self.cancel).await {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(level = %self.doc.id, error = %anyhow::Error::new(err), "environment failed to load");
                return;
            }
        };
        let mut scene = self.services.scene.borrow_mut();
        for clip in &bundle.animations {
            scene.dispose_animation(clip.handle);
        }
        scene.set_transform(
            bundle.root,
            Transform3D { position: env.offset.into(), rotation: Vec3::ZERO, scale: Vec3::splat(env.scale) },
        );
        let mut bodies = Vec::new();
        for mesh in &bundle.meshes {
            scene.set_receive_shadows(mesh.node, true);
            if mesh.vertex_count > 0 {
                bodies.push(scene.create_static_collision_body(mesh.node));
            }
        }
        debug!(asset = %path, meshes = bundle.meshes.len(), bodies = bodies.len(), "environment ready");
        self.environment = Some(EnvironmentInstance { root: bundle.root, bodies });
    }

    /// Spawn `spawn` into slot `index`, returning the animation names (empty unless NPC).
    /// The slot must be vacant.
    pub(super) async fn spawn_at(&mut self, index: usize, spawn: &EntitySpawn) -> Result<Vec<String>, SpawnError> {
        let editor_mode = self.editor.is_some();
        let (entity, animations) = match spawn {
            EntitySpawn::Npc(record) => {
                let name = record.display_name(index);
                let npc = self.factory.spawn_npc(&self.services.scene, &name, record, &self.cancel).await?;
                let animations = npc.animation_names();
                (LiveEntity::Npc(npc), animations)
            }
            EntitySpawn::Portal(record) => {
                let mut scene = self.services.scene.borrow_mut();
                let portal =
                    self.factory.spawn_portal(&mut *scene, record.position.into(), &record.target_level, editor_mode);
                (LiveEntity::Portal(portal), Vec::new())
            }
            EntitySpawn::Prop(record) => {
                let mut prop = self.factory.spawn_prop(&self.services.scene, record, &self.cancel).await?;
                if editor_mode {
                    prop.set_physics_enabled(&mut *self.services.scene.borrow_mut(), false);
                }
                (LiveEntity::Prop(prop), Vec::new())
            }
        };
        debug!(index, kind = spawn.kind().label(), "entity spawned");
        if let Some(mut displaced) = self.registry.insert(index, entity) {
            warn!(index, "spawn replaced a live entity in an occupied slot");
            displaced.dispose(&mut *self.services.scene.borrow_mut());
        }
        Ok(animations)
    }

    /// Place the player at the document's start point and hand control to the frame loop.
    pub fn start(&mut self) {
        if self.phase == LevelPhase::Disposed {
            return;
        }
        if let Some(start) = self.doc.player_start {
            self.player.position = start.into();
        }
        self.player.physics_enabled = self.editor.is_none();
        self.services.scene.borrow_mut().set_player_physics(self.player.physics_enabled);
        self.phase = LevelPhase::Running;
        info!(level = %self.doc.id, position = ?self.player.position, "level started");
    }

    pub fn update(&mut self, dt: f32) {
        if matches!(self.phase, LevelPhase::Created | LevelPhase::Disposed) {
            return;
        }
        let dt = self.clock.tick(dt);
        let scene_time = self.clock.elapsed_seconds();
        {
            let mut scene = self.services.scene.borrow_mut();
            for (_, portal) in self.registry.portals_mut() {
                portal.tick(&mut *scene, scene_time);
            }
        }
        self.pump_dialogue();
        if self.editor.is_none() {
            self.check_npc_proximity();
            self.run_triggers();
            self.effects.apply(dt, &mut self.player);
        }
        self.pump_dialogue();
    }

    pub fn render(&mut self) {
        if self.phase == LevelPhase::Disposed {
            return;
        }
        let mut scene = self.services.scene.borrow_mut();
        scene.present(&self.player.presentation());
        scene.render_frame();
    }

    /// Forward dialogue notifications and put the talking NPC back to idle once its
    /// conversation ends.
    pub(super) fn pump_dialogue(&mut self) {
        let events = self.services.dialogue.borrow_mut().drain_events();
        for event in events {
            if let DialogueEvent::Ended { .. } = &event {
                if let Some(index) = self.talking_npc.take() {
                    if let Some(npc) = self.registry.npc_mut(index) {
                        npc.play_idle(&mut *self.services.scene.borrow_mut());
                    }
                }
            }
            self.events.push(LevelEvent::Dialogue(event));
        }
    }

    /// Click-to-travel. Ignored while editing or for anything that is not a portal.
    pub fn activate_portal(&mut self, index: usize) -> bool {
        if self.phase == LevelPhase::Disposed {
            return false;
        }
        let Some(target) = self.registry.portal(index).and_then(|portal| portal.activate()).map(str::to_string)
        else {
            return false;
        };
        info!(level = %self.doc.id, %target, "portal activated");
        self.services.audio.borrow_mut().play(&self.config.audio.teleport_sound, false, None);
        self.events.push(LevelEvent::TransitionRequested { target });
        true
    }

    /// Apply a modified document without reloading: atmosphere, music, dialogues, effects and
    /// triggers. Structural entity changes go through the live edit calls instead; NPC
    /// interaction data is adopted for slots whose model did not change.
    pub fn hot_update(&mut self, doc: LevelDocument) -> bool {
        if self.phase == LevelPhase::Disposed {
            return false;
        }
        if doc.id != self.doc.id {
            warn!(current = %self.doc.id, incoming = %doc.id, "hot update for a different level id");
        }
        let music_changed = doc.music != self.current_music;
        if music_changed {
            let mut audio = self.services.audio.borrow_mut();
            if let Some(previous) = self.current_music.as_deref() {
                audio.stop(previous);
            }
            if let Some(next) = doc.music.as_deref() {
                audio.play(next, true, Some(self.config.audio.music_volume));
            }
            self.current_music = doc.music.clone();
        }
        self.services.scene.borrow_mut().apply_atmosphere(&doc.settings);
        {
            let mut dialogue = self.services.dialogue.borrow_mut();
            dialogue.clear_registered();
            for entry in &doc.dialogues {
                dialogue.register(entry.clone());
            }
        }
        self.effects.replace(doc.effects.clone());
        self.triggers.replace(&doc.triggers);

        let mut entities = std::mem::take(&mut self.doc.entities);
        if doc.entities.len() != entities.len() {
            debug!(current = entities.len(), incoming = doc.entities.len(), "entity count differs; keeping live entities");
        }
        for (current, incoming) in entities.iter_mut().zip(&doc.entities) {
            if let (EntitySpawn::Npc(current), EntitySpawn::Npc(incoming)) = (current, incoming) {
                if current.model == incoming.model && current.asset_path == incoming.asset_path {
                    current.requirements = incoming.requirements.clone();
                    current.rewards = incoming.rewards.clone();
                    current.success_dialogue = incoming.success_dialogue.clone();
                    current.fail_dialogue = incoming.fail_dialogue.clone();
                    current.quest = incoming.quest.clone();
                }
            }
        }
        self.doc = LevelDocument { entities, ..doc };
        info!(level = %self.doc.id, music_changed, "level hot-updated");
        self.events.push(LevelEvent::HotUpdated { level: self.doc.id.clone(), music_changed });
        music_changed
    }

    /// Release everything this level created. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.phase == LevelPhase::Disposed {
            return;
        }
        self.phase = LevelPhase::Disposed;
        self.cancel.cancel();
        {
            let mut scene = self.services.scene.borrow_mut();
            if self.editor.take().is_some() {
                scene.attach_gizmo(None);
                scene.set_gizmo_mode(None);
            }
            self.registry.dispose_all(&mut *scene);
            if let Some(env) = self.environment.take() {
                for body in env.bodies {
                    scene.remove_body(body);
                }
                scene.dispose_node(env.root);
            }
        }
        if let Some(music) = self.current_music.take() {
            self.services.audio.borrow_mut().stop(&music);
        }
        {
            let mut dialogue = self.services.dialogue.borrow_mut();
            dialogue.skip();
            dialogue.clear_registered();
        }
        self.talking_npc = None;
        self.pump_dialogue();
        info!(level = %self.doc.id, "level disposed");
    }
}

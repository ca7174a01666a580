use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::catalog::IDLE_NAME_CANDIDATES;
use crate::scene::{AnimationClip, MeshBundle, NodeId, SceneBackend, SubMesh};

#[derive(Debug, Clone, PartialEq)]
pub struct NpcOptions {
    pub scale: f32,
    pub cast_shadows: bool,
    pub idle_animation: Option<String>,
    pub interact_animation: Option<String>,
}

impl Default for NpcOptions {
    fn default() -> Self {
        Self { scale: 1.0, cast_shadows: true, idle_animation: None, interact_animation: None }
    }
}

/// A loaded character model with name-addressed animations.
pub struct Npc {
    name: String,
    asset_path: String,
    root: NodeId,
    meshes: Vec<SubMesh>,
    animations: Vec<AnimationClip>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
    current: Option<usize>,
    idle: Option<usize>,
    interact: Option<usize>,
    disposed: bool,
}

impl Npc {
    /// Applies scale and shadows, stops every clip and starts the resolved idle clip.
    pub fn new(
        scene: &mut dyn SceneBackend,
        name: impl Into<String>,
        asset_path: impl Into<String>,
        bundle: MeshBundle,
        options: &NpcOptions,
    ) -> Self {
        let MeshBundle { root, meshes, animations } = bundle;
        let mut exact = HashMap::with_capacity(animations.len());
        let mut folded = HashMap::with_capacity(animations.len());
        for (i, clip) in animations.iter().enumerate() {
            exact.entry(clip.name.clone()).or_insert(i);
            folded.entry(clip.name.to_lowercase()).or_insert(i);
        }
        let mut npc = Self {
            name: name.into(),
            asset_path: asset_path.into(),
            root,
            meshes,
            animations,
            exact,
            folded,
            current: None,
            idle: None,
            interact: None,
            disposed: false,
        };

        if let Some(mut transform) = scene.transform(root) {
            transform.scale = Vec3::splat(options.scale);
            scene.set_transform(root, transform);
        }
        if options.cast_shadows {
            for mesh in &npc.meshes {
                scene.add_shadow_caster(mesh.node);
            }
        }

        npc.idle = npc.resolve_idle(options.idle_animation.as_deref());
        npc.interact = options.interact_animation.as_deref().and_then(|name| npc.resolve(name));
        for clip in &npc.animations {
            scene.stop_animation(clip.handle);
        }
        match npc.idle {
            Some(idle) => npc.start(scene, idle),
            None if !npc.animations.is_empty() => {
                debug!(npc = %npc.name, "no idle animation matched; leaving model static");
            }
            None => {}
        }
        npc
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn meshes(&self) -> &[SubMesh] {
        &self.meshes
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn animation_names(&self) -> Vec<String> {
        self.animations.iter().map(|clip| clip.name.clone()).collect()
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current.map(|i| self.animations[i].name.as_str())
    }

    pub fn has_interact_animation(&self) -> bool {
        self.interact.is_some()
    }

    /// Exact name, then case-insensitive name, then case-insensitive substring.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        if let Some(&i) = self.exact.get(name) {
            return Some(i);
        }
        let needle = name.to_lowercase();
        if let Some(&i) = self.folded.get(&needle) {
            return Some(i);
        }
        if needle.is_empty() {
            return None;
        }
        self.animations.iter().position(|clip| clip.name.to_lowercase().contains(&needle))
    }

    fn resolve_idle(&self, explicit: Option<&str>) -> Option<usize> {
        if let Some(i) = explicit.and_then(|name| self.resolve(name)) {
            return Some(i);
        }
        IDLE_NAME_CANDIDATES.iter().find_map(|pattern| {
            self.animations.iter().position(|clip| clip.name.to_lowercase().contains(pattern))
        })
    }

    /// Switch to `name`. Already playing it is a successful no-op.
    pub fn play_animation(&mut self, scene: &mut dyn SceneBackend, name: &str) -> bool {
        if self.disposed {
            return false;
        }
        if self.current_animation() == Some(name) {
            return true;
        }
        let Some(target) = self.resolve(name) else {
            debug!(npc = %self.name, animation = name, "animation not found");
            return false;
        };
        if self.current == Some(target) {
            return true;
        }
        self.start(scene, target);
        true
    }

    pub fn play_idle(&mut self, scene: &mut dyn SceneBackend) -> bool {
        match self.idle {
            Some(idle) if !self.disposed => {
                if self.current != Some(idle) {
                    self.start(scene, idle);
                }
                true
            }
            _ => false,
        }
    }

    pub fn play_interact(&mut self, scene: &mut dyn SceneBackend) -> bool {
        match self.interact {
            Some(interact) if !self.disposed => {
                if self.current != Some(interact) {
                    self.start(scene, interact);
                }
                true
            }
            _ => false,
        }
    }

    fn start(&mut self, scene: &mut dyn SceneBackend, index: usize) {
        if let Some(previous) = self.current.take() {
            scene.stop_animation(self.animations[previous].handle);
        }
        scene.play_animation(self.animations[index].handle, true);
        self.current = Some(index);
    }

    /// Releases animations and the model. Safe to call more than once.
    pub fn dispose(&mut self, scene: &mut dyn SceneBackend) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for clip in &self.animations {
            scene.stop_animation(clip.handle);
            scene.dispose_animation(clip.handle);
        }
        self.current = None;
        scene.dispose_node(self.root);
    }
}

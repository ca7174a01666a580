use glam::Vec3;
use serde::Deserialize;

use crate::scene::{NodeId, PortalParts, SceneBackend};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PortalMotion {
    #[serde(default = "PortalMotion::default_spin_speed")]
    pub spin_speed: f32,
    #[serde(default = "PortalMotion::default_bob_amplitude")]
    pub bob_amplitude: f32,
    #[serde(default = "PortalMotion::default_bob_speed")]
    pub bob_speed: f32,
}

impl PortalMotion {
    const fn default_spin_speed() -> f32 {
        0.8
    }

    const fn default_bob_amplitude() -> f32 {
        0.15
    }

    const fn default_bob_speed() -> f32 {
        2.0
    }
}

impl Default for PortalMotion {
    fn default() -> Self {
        Self {
            spin_speed: Self::default_spin_speed(),
            bob_amplitude: Self::default_bob_amplitude(),
            bob_speed: Self::default_bob_speed(),
        }
    }
}

/// Spinning, bobbing marker that asks for a level change when clicked.
pub struct Portal {
    parts: PortalParts,
    target_level: String,
    base_position: Vec3,
    motion: PortalMotion,
    editor_mode: bool,
    animating: bool,
    disposed: bool,
}

impl Portal {
    pub fn new(
        scene: &mut dyn SceneBackend,
        position: Vec3,
        target_level: impl Into<String>,
        editor_mode: bool,
        motion: PortalMotion,
    ) -> Self {
        let parts = scene.create_portal_marker(position);
        scene.set_clickable(parts.root, !editor_mode);
        Self {
            parts,
            target_level: target_level.into(),
            base_position: position,
            motion,
            editor_mode,
            animating: true,
            disposed: false,
        }
    }

    pub fn root(&self) -> NodeId {
        self.parts.root
    }

    pub fn target_level(&self) -> &str {
        &self.target_level
    }

    pub fn editor_mode(&self) -> bool {
        self.editor_mode
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn set_editor_mode(&mut self, scene: &mut dyn SceneBackend, editor_mode: bool) {
        if self.disposed || self.editor_mode == editor_mode {
            return;
        }
        self.editor_mode = editor_mode;
        scene.set_clickable(self.parts.root, !editor_mode);
        if !editor_mode {
            if let Some(transform) = scene.transform(self.parts.root) {
                self.base_position = transform.position;
            }
        }
    }

    /// Rest position the bob oscillates around; editor moves write through here.
    pub fn set_base_position(&mut self, position: Vec3) {
        self.base_position = position;
    }

    /// Pose is a pure function of scene time. While editing only the spin runs so the
    /// gizmo keeps control of the position.
    pub fn tick(&mut self, scene: &mut dyn SceneBackend, scene_time: f32) {
        if self.disposed || !self.animating {
            return;
        }
        let Some(mut transform) = scene.transform(self.parts.root) else {
            return;
        };
        transform.rotation.y = (self.motion.spin_speed * scene_time) % std::f32::consts::TAU;
        if !self.editor_mode {
            transform.position = self.base_position;
            transform.position.y += (scene_time * self.motion.bob_speed).sin() * self.motion.bob_amplitude;
        }
        scene.set_transform(self.parts.root, transform);
    }

    /// Target level to travel to, or `None` while editing or after disposal.
    pub fn activate(&self) -> Option<&str> {
        if self.editor_mode || self.disposed {
            None
        } else {
            Some(&self.target_level)
        }
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneBackend) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.animating = false;
        scene.set_clickable(self.parts.root, false);
        scene.dispose_light(self.parts.light);
        scene.dispose_material(self.parts.material);
        scene.dispose_node(self.parts.root);
    }
}

//! Primitives consumed from the host 3D engine.
//!
//! The level runtime never touches engine objects directly; everything goes through
//! [`SceneBackend`] using opaque handles. Handles are plain ids so they can live in side
//! tables owned by the runtime.

use anyhow::Result;
use futures::future::LocalBoxFuture;
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::gizmo::{GizmoAxis, GizmoMode};
use crate::level::document::LevelSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u64);

/// Position, euler rotation (radians, XYZ order) and scale of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self { position: Vec3::ZERO, rotation: Vec3::ZERO, scale: Vec3::ONE }
    }
}

impl Transform3D {
    pub fn at(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubMesh {
    pub node: NodeId,
    pub vertex_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub handle: AnimationHandle,
}

/// Result of a mesh import: a root node, its renderable children and any animation groups.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBundle {
    pub root: NodeId,
    pub meshes: Vec<SubMesh>,
    pub animations: Vec<AnimationClip>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalParts {
    pub root: NodeId,
    pub light: LightId,
    pub material: MaterialId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColliderShape {
    #[default]
    Mesh,
    Box,
    Sphere,
    Capsule,
    ConvexHull,
}

/// Per-frame player-facing values written by effects and triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    pub spotlight_intensity: f32,
    pub camera_jitter: Vec3,
    pub vignette_weight: f32,
}

pub trait SceneBackend {
    /// Import a mesh file. The returned future owns everything it needs, so callers may
    /// release their borrow of the backend while it is pending.
    fn load_mesh(&mut self, path: &str) -> LocalBoxFuture<'static, Result<MeshBundle>>;

    fn create_portal_marker(&mut self, position: Vec3) -> PortalParts;

    fn dispose_node(&mut self, node: NodeId);
    fn dispose_light(&mut self, light: LightId);
    fn dispose_material(&mut self, material: MaterialId);

    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
    fn transform(&self, node: NodeId) -> Option<Transform3D>;
    fn set_transform(&mut self, node: NodeId, transform: Transform3D);

    fn set_receive_shadows(&mut self, node: NodeId, receive: bool);
    fn add_shadow_caster(&mut self, node: NodeId);

    fn create_static_collision_body(&mut self, node: NodeId) -> BodyHandle;
    /// Body spanning every node in `nodes`; zero mass is static, anything else dynamic.
    fn create_body(&mut self, nodes: &[NodeId], mass: f32, shape: ColliderShape) -> BodyHandle;
    fn remove_body(&mut self, body: BodyHandle);
    fn set_body_enabled(&mut self, body: BodyHandle, enabled: bool);
    fn set_kinematic_target(&mut self, body: BodyHandle, transform: Transform3D);
    fn set_player_physics(&mut self, enabled: bool);

    fn play_animation(&mut self, handle: AnimationHandle, looped: bool);
    fn stop_animation(&mut self, handle: AnimationHandle);
    fn dispose_animation(&mut self, handle: AnimationHandle);

    /// Toggle whether pointer activation on `node` is reported to the runtime.
    fn set_clickable(&mut self, node: NodeId, clickable: bool);

    fn attach_gizmo(&mut self, node: Option<NodeId>);
    /// `None` hides every manipulator.
    fn set_gizmo_mode(&mut self, mode: Option<GizmoMode>);
    fn gizmo_axis_hovered(&self, mode: GizmoMode, axis: GizmoAxis) -> bool;

    fn apply_atmosphere(&mut self, settings: &LevelSettings);
    fn present(&mut self, presentation: &Presentation);
    fn render_frame(&mut self);
}

use tracing::debug;

use crate::level::document::{PhysicsDescriptor, PropSpawn};
use crate::scene::{BodyHandle, MeshBundle, NodeId, SceneBackend, SubMesh, Transform3D};

/// Static scenery or a physics object loaded from a mesh file.
pub struct Prop {
    asset_path: String,
    root: NodeId,
    meshes: Vec<SubMesh>,
    bodies: Vec<BodyHandle>,
    physics: Option<PhysicsDescriptor>,
    disposed: bool,
}

impl Prop {
    pub fn new(scene: &mut dyn SceneBackend, asset_path: impl Into<String>, bundle: MeshBundle, spawn: &PropSpawn) -> Self {
        let MeshBundle { root, meshes, animations } = bundle;
        for clip in animations {
            scene.dispose_animation(clip.handle);
        }
        let transform = Transform3D {
            position: spawn.position.into(),
            rotation: spawn.rotation.map(Into::into).unwrap_or_default(),
            scale: spawn.scale.map(Into::into).unwrap_or(glam::Vec3::ONE),
        };
        scene.set_transform(root, transform);
        for mesh in &meshes {
            scene.add_shadow_caster(mesh.node);
            scene.set_receive_shadows(mesh.node, true);
        }
        let mut prop = Self {
            asset_path: asset_path.into(),
            root,
            meshes,
            bodies: Vec::new(),
            physics: spawn.physics.clone(),
            disposed: false,
        };
        prop.create_bodies(scene);
        prop
    }

    /// Zero mass gets one static body per sub-mesh with geometry; nonzero mass gets a single
    /// compound body over all of them so multi-mesh models move as one.
    fn create_bodies(&mut self, scene: &mut dyn SceneBackend) {
        let Some(physics) = self.physics.as_ref().filter(|physics| physics.enabled) else {
            return;
        };
        let solid: Vec<NodeId> =
            self.meshes.iter().filter(|mesh| mesh.vertex_count > 0).map(|mesh| mesh.node).collect();
        if solid.is_empty() {
            debug!(asset = %self.asset_path, "prop has no geometry to collide with");
            return;
        }
        if physics.mass == 0.0 {
            self.bodies = solid.iter().map(|&node| scene.create_static_collision_body(node)).collect();
        } else {
            self.bodies = vec![scene.create_body(&solid, physics.mass, physics.shape)];
        }
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    pub fn is_dynamic(&self) -> bool {
        self.physics.as_ref().map_or(false, |physics| physics.enabled && physics.mass != 0.0)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn set_physics_enabled(&mut self, scene: &mut dyn SceneBackend, enabled: bool) {
        for &body in &self.bodies {
            scene.set_body_enabled(body, enabled);
        }
    }

    pub fn push_kinematic_target(&self, scene: &mut dyn SceneBackend, transform: Transform3D) {
        for &body in &self.bodies {
            scene.set_kinematic_target(body, transform);
        }
    }

    pub fn dispose(&mut self, scene: &mut dyn SceneBackend) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for body in self.bodies.drain(..) {
            scene.remove_body(body);
        }
        scene.dispose_node(self.root);
    }
}

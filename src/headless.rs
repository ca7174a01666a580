//! In-memory [`SceneBackend`] for the headless runner and tests. It keeps just enough
//! state to observe what the runtime asked for: node lifetimes, bodies, animations,
//! gizmo state and the last presentation.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::anyhow;
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use glam::Vec3;

use crate::catalog::{normalize_asset_path, NpcCatalog};
use crate::gizmo::{GizmoAxis, GizmoMode};
use crate::level::document::{EntitySpawn, LevelDocument, LevelSettings};
use crate::scene::{
    AnimationClip, AnimationHandle, BodyHandle, ColliderShape, LightId, MaterialId, MeshBundle, NodeId, PortalParts,
    Presentation, SceneBackend, SubMesh, Transform3D,
};
use crate::services::LoadCancel;

#[derive(Debug, Clone, Default)]
struct AssetTemplate {
    vertex_counts: Vec<usize>,
    animations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HeadlessNode {
    pub parent: Option<NodeId>,
    pub transform: Transform3D,
    pub receive_shadows: bool,
    pub casts_shadow: bool,
    pub clickable: bool,
    pub alive: bool,
    pub dispose_calls: u32,
    pub source: Option<String>,
}

impl HeadlessNode {
    fn new(parent: Option<NodeId>, source: Option<String>) -> Self {
        Self {
            parent,
            transform: Transform3D::default(),
            receive_shadows: false,
            casts_shadow: false,
            clickable: false,
            alive: true,
            dispose_calls: 0,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyRecord {
    pub nodes: Vec<NodeId>,
    pub mass: f32,
    pub shape: ColliderShape,
    pub enabled: bool,
    pub kinematic_target: Option<Transform3D>,
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRecord {
    pub name: String,
    pub playing: bool,
    pub looped: bool,
    pub disposed: bool,
}

#[derive(Default)]
pub struct HeadlessScene {
    next_id: u64,
    assets: HashMap<String, AssetTemplate>,
    nodes: BTreeMap<NodeId, HeadlessNode>,
    animations: HashMap<AnimationHandle, AnimationRecord>,
    bodies: BTreeMap<u64, BodyRecord>,
    light_disposals: HashMap<LightId, u32>,
    material_disposals: HashMap<MaterialId, u32>,
    gizmo_target: Option<NodeId>,
    gizmo_mode: Option<GizmoMode>,
    hovered_axes: HashSet<(GizmoMode, GizmoAxis)>,
    player_physics: bool,
    atmosphere_applied: usize,
    last_settings: Option<LevelSettings>,
    last_presentation: Option<Presentation>,
    frames_rendered: u64,
    loaded_paths: Vec<String>,
    cancel_hooks: HashMap<String, LoadCancel>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self { player_physics: true, ..Self::default() }
    }

    /// Make `path` loadable. Each entry in `vertex_counts` becomes a child mesh.
    pub fn register_asset(&mut self, path: &str, vertex_counts: &[usize], animations: &[&str]) {
        let key = normalize_asset_path(path).unwrap_or_else(|| path.to_string());
        self.assets.insert(
            key,
            AssetTemplate {
                vertex_counts: vertex_counts.to_vec(),
                animations: animations.iter().map(|name| name.to_string()).collect(),
            },
        );
    }

    /// Stand-ins for every asset `doc` references so it can be loaded without an importer.
    /// Characters get a walk clip plus whatever idle and interact clips their policy names.
    pub fn register_placeholders(&mut self, doc: &LevelDocument, catalog: &NpcCatalog) -> usize {
        let mut registered = 0;
        if let Some(env) = doc.environment.as_ref() {
            self.register_asset(&env.asset_path, &[4096, 0], &[]);
            registered += 1;
        }
        for spawn in &doc.entities {
            match spawn {
                EntitySpawn::Npc(npc) => {
                    let Some(policy) = catalog.resolve(npc.model.as_deref(), npc.asset_path.as_deref()) else {
                        continue;
                    };
                    let mut clips = vec!["Walk".to_string()];
                    clips.extend(npc.idle_animation.clone().or(policy.idle_animation).or(Some("Idle".into())));
                    clips.extend(npc.interact_animation.clone().or(policy.interact_animation));
                    let names: Vec<&str> = clips.iter().map(String::as_str).collect();
                    self.register_asset(&policy.asset_path, &[512], &names);
                    registered += 1;
                }
                EntitySpawn::Prop(prop) => {
                    self.register_asset(&prop.asset_path, &[256], &[]);
                    registered += 1;
                }
                EntitySpawn::Portal(_) => {}
            }
        }
        registered
    }

    /// Trip `cancel` the moment `path` is requested, as if the owner were disposed while
    /// the import was in flight.
    pub fn cancel_on_load(&mut self, path: &str, cancel: LoadCancel) {
        let key = normalize_asset_path(path).unwrap_or_else(|| path.to_string());
        self.cancel_hooks.insert(key, cancel);
    }

    pub fn set_axis_hovered(&mut self, mode: GizmoMode, axis: GizmoAxis, hovered: bool) {
        if hovered {
            self.hovered_axes.insert((mode, axis));
        } else {
            self.hovered_axes.remove(&(mode, axis));
        }
    }

    pub fn node(&self, node: NodeId) -> Option<&HeadlessNode> {
        self.nodes.get(&node)
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.iter().filter(|(_, record)| record.parent == Some(node)).map(|(&id, _)| id).collect()
    }

    pub fn is_alive(&self, node: NodeId) -> bool {
        self.nodes.get(&node).map_or(false, |record| record.alive)
    }

    pub fn dispose_calls(&self, node: NodeId) -> u32 {
        self.nodes.get(&node).map_or(0, |record| record.dispose_calls)
    }

    /// Live root nodes created from `path` (portal markers have no source).
    pub fn live_roots_from(&self, path: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, record)| record.alive && record.parent.is_none() && record.source.as_deref() == Some(path))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn body(&self, body: BodyHandle) -> Option<&BodyRecord> {
        self.bodies.get(&body.0)
    }

    pub fn active_bodies(&self) -> Vec<&BodyRecord> {
        self.bodies.values().filter(|body| !body.removed).collect()
    }

    pub fn animation(&self, handle: AnimationHandle) -> Option<&AnimationRecord> {
        self.animations.get(&handle)
    }

    pub fn playing_animations(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.animations.values().filter(|anim| anim.playing).map(|anim| anim.name.clone()).collect();
        names.sort();
        names
    }

    pub fn light_disposals(&self, light: LightId) -> u32 {
        self.light_disposals.get(&light).copied().unwrap_or(0)
    }

    pub fn total_light_disposals(&self) -> u32 {
        self.light_disposals.values().sum()
    }

    pub fn material_disposals(&self, material: MaterialId) -> u32 {
        self.material_disposals.get(&material).copied().unwrap_or(0)
    }

    pub fn gizmo_target(&self) -> Option<NodeId> {
        self.gizmo_target
    }

    pub fn gizmo_mode(&self) -> Option<GizmoMode> {
        self.gizmo_mode
    }

    pub fn player_physics(&self) -> bool {
        self.player_physics
    }

    pub fn atmosphere_applied(&self) -> usize {
        self.atmosphere_applied
    }

    pub fn last_settings(&self) -> Option<&LevelSettings> {
        self.last_settings.as_ref()
    }

    pub fn last_presentation(&self) -> Option<&Presentation> {
        self.last_presentation.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn loaded_paths(&self) -> &[String] {
        &self.loaded_paths
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_node(&mut self, parent: Option<NodeId>, source: Option<String>) -> NodeId {
        let id = NodeId(self.next_id());
        self.nodes.insert(id, HeadlessNode::new(parent, source));
        id
    }

    fn instantiate(&mut self, path: &str, template: &AssetTemplate) -> MeshBundle {
        let root = self.add_node(None, Some(path.to_string()));
        let meshes = template
            .vertex_counts
            .iter()
            .map(|&vertex_count| SubMesh { node: self.add_node(Some(root), Some(path.to_string())), vertex_count })
            .collect();
        let animations = template
            .animations
            .iter()
            .map(|name| {
                let handle = AnimationHandle(self.next_id());
                self.animations.insert(
                    handle,
                    AnimationRecord { name: name.clone(), playing: false, looped: false, disposed: false },
                );
                AnimationClip { name: name.clone(), handle }
            })
            .collect();
        MeshBundle { root, meshes, animations }
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut HeadlessNode> {
        self.nodes.get_mut(&node).filter(|record| record.alive)
    }
}

impl SceneBackend for HeadlessScene {
    fn load_mesh(&mut self, path: &str) -> LocalBoxFuture<'static, anyhow::Result<MeshBundle>> {
        self.loaded_paths.push(path.to_string());
        let Some(template) = self.assets.get(path).cloned() else {
            return future::ready(Err(anyhow!("asset '{path}' not found"))).boxed_local();
        };
        let bundle = self.instantiate(path, &template);
        if let Some(cancel) = self.cancel_hooks.remove(path) {
            cancel.cancel();
        }
        future::ready(Ok(bundle)).boxed_local()
    }

    fn create_portal_marker(&mut self, position: Vec3) -> PortalParts {
        let root = self.add_node(None, None);
        if let Some(node) = self.node_mut(root) {
            node.transform.position = position;
        }
        PortalParts { root, light: LightId(self.next_id()), material: MaterialId(self.next_id()) }
    }

    fn dispose_node(&mut self, node: NodeId) {
        let Some(record) = self.nodes.get_mut(&node) else {
            return;
        };
        record.dispose_calls += 1;
        record.alive = false;
        let mut stack = vec![node];
        while let Some(parent) = stack.pop() {
            for (&id, child) in self.nodes.iter_mut() {
                if child.parent == Some(parent) && child.alive {
                    child.alive = false;
                    stack.push(id);
                }
            }
        }
        if self.gizmo_target == Some(node) {
            self.gizmo_target = None;
        }
    }

    fn dispose_light(&mut self, light: LightId) {
        *self.light_disposals.entry(light).or_insert(0) += 1;
    }

    fn dispose_material(&mut self, material: MaterialId) {
        *self.material_disposals.entry(material).or_insert(0) += 1;
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|record| record.parent)
    }

    fn transform(&self, node: NodeId) -> Option<Transform3D> {
        self.nodes.get(&node).filter(|record| record.alive).map(|record| record.transform)
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform3D) {
        if let Some(record) = self.node_mut(node) {
            record.transform = transform;
        }
    }

    fn set_receive_shadows(&mut self, node: NodeId, receive: bool) {
        if let Some(record) = self.node_mut(node) {
            record.receive_shadows = receive;
        }
    }

    fn add_shadow_caster(&mut self, node: NodeId) {
        if let Some(record) = self.node_mut(node) {
            record.casts_shadow = true;
        }
    }

    fn create_static_collision_body(&mut self, node: NodeId) -> BodyHandle {
        self.create_body(&[node], 0.0, ColliderShape::Mesh)
    }

    fn create_body(&mut self, nodes: &[NodeId], mass: f32, shape: ColliderShape) -> BodyHandle {
        let id = self.next_id();
        self.bodies.insert(
            id,
            BodyRecord { nodes: nodes.to_vec(), mass, shape, enabled: true, kinematic_target: None, removed: false },
        );
        BodyHandle(id)
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if let Some(record) = self.bodies.get_mut(&body.0) {
            record.removed = true;
        }
    }

    fn set_body_enabled(&mut self, body: BodyHandle, enabled: bool) {
        if let Some(record) = self.bodies.get_mut(&body.0) {
            record.enabled = enabled;
        }
    }

    fn set_kinematic_target(&mut self, body: BodyHandle, transform: Transform3D) {
        if let Some(record) = self.bodies.get_mut(&body.0) {
            record.kinematic_target = Some(transform);
        }
    }

    fn set_player_physics(&mut self, enabled: bool) {
        self.player_physics = enabled;
    }

    fn play_animation(&mut self, handle: AnimationHandle, looped: bool) {
        if let Some(anim) = self.animations.get_mut(&handle).filter(|anim| !anim.disposed) {
            anim.playing = true;
            anim.looped = looped;
        }
    }

    fn stop_animation(&mut self, handle: AnimationHandle) {
        if let Some(anim) = self.animations.get_mut(&handle) {
            anim.playing = false;
        }
    }

    fn dispose_animation(&mut self, handle: AnimationHandle) {
        if let Some(anim) = self.animations.get_mut(&handle) {
            anim.playing = false;
            anim.disposed = true;
        }
    }

    fn set_clickable(&mut self, node: NodeId, clickable: bool) {
        if let Some(record) = self.nodes.get_mut(&node) {
            record.clickable = clickable;
        }
    }

    fn attach_gizmo(&mut self, node: Option<NodeId>) {
        self.gizmo_target = node.filter(|&node| self.is_alive(node));
    }

    fn set_gizmo_mode(&mut self, mode: Option<GizmoMode>) {
        self.gizmo_mode = mode;
    }

    fn gizmo_axis_hovered(&self, mode: GizmoMode, axis: GizmoAxis) -> bool {
        self.hovered_axes.contains(&(mode, axis))
    }

    fn apply_atmosphere(&mut self, settings: &LevelSettings) {
        self.atmosphere_applied += 1;
        self.last_settings = Some(settings.clone());
    }

    fn present(&mut self, presentation: &Presentation) {
        self.last_presentation = Some(*presentation);
    }

    fn render_frame(&mut self) {
        self.frames_rendered += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hovered_handles_are_tracked_per_mode() {
        let mut scene = HeadlessScene::new();
        scene.set_axis_hovered(GizmoMode::Rotate, GizmoAxis::Y, true);
        assert!(scene.gizmo_axis_hovered(GizmoMode::Rotate, GizmoAxis::Y));
        assert!(!scene.gizmo_axis_hovered(GizmoMode::Translate, GizmoAxis::Y));
        scene.set_axis_hovered(GizmoMode::Rotate, GizmoAxis::Y, false);
        assert!(!scene.gizmo_axis_hovered(GizmoMode::Rotate, GizmoAxis::Y));
    }

    #[test]
    fn disposing_a_root_kills_its_children_once() {
        let mut scene = HeadlessScene::new();
        scene.register_asset("assets/crate.glb", &[12, 0], &[]);
        let bundle = pollster::block_on(scene.load_mesh("/assets/crate.glb")).expect("registered asset loads");
        assert_eq!(bundle.meshes.len(), 2);
        scene.dispose_node(bundle.root);
        assert!(!scene.is_alive(bundle.meshes[0].node));
        assert_eq!(scene.dispose_calls(bundle.root), 1);
        assert_eq!(scene.dispose_calls(bundle.meshes[0].node), 0);
    }

    #[test]
    fn unknown_asset_fails_to_load() {
        let mut scene = HeadlessScene::new();
        let err = pollster::block_on(scene.load_mesh("/assets/missing.glb")).unwrap_err();
        assert!(err.to_string().contains("missing.glb"));
        assert_eq!(scene.loaded_paths(), ["/assets/missing.glb".to_string()]);
    }
}

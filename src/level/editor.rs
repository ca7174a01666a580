use glam::Vec3;
use tracing::{debug, info};

use super::runtime::Level;
use crate::gizmo::{GizmoAxis, GizmoDrag, GizmoMode, ManipulatorSet};
use crate::level::document::EntityKind;
use crate::scene::{NodeId, Transform3D};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Entity(usize),
    None,
}

impl Selection {
    pub fn label(self) -> &'static str {
        match self {
            Selection::Entity(_) => "entity",
            Selection::None => "none",
        }
    }

    /// Index as reported to UIs that use `-1` for "nothing".
    pub fn index(self) -> i64 {
        match self {
            Selection::Entity(index) => index as i64,
            Selection::None => -1,
        }
    }
}

type SelectFn = Box<dyn FnMut(Selection)>;
type TransformFn = Box<dyn FnMut(usize, Transform3D)>;
type InvalidateFn = Box<dyn FnMut(usize)>;

/// Hooks an editor UI installs to hear about picks, gizmo edits and removals.
pub struct EditorCallbacks {
    on_select: SelectFn,
    on_transform_change: TransformFn,
    on_selection_invalidated: Option<InvalidateFn>,
}

impl EditorCallbacks {
    pub fn new(
        on_select: impl FnMut(Selection) + 'static,
        on_transform_change: impl FnMut(usize, Transform3D) + 'static,
    ) -> Self {
        Self {
            on_select: Box::new(on_select),
            on_transform_change: Box::new(on_transform_change),
            on_selection_invalidated: None,
        }
    }

    /// Called with the removed index whenever a live removal shifts indices.
    pub fn with_selection_invalidated(mut self, callback: impl FnMut(usize) + 'static) -> Self {
        self.on_selection_invalidated = Some(Box::new(callback));
        self
    }
}

pub struct EditorSession {
    callbacks: EditorCallbacks,
    selected: Option<usize>,
    manipulators: ManipulatorSet,
}

impl EditorSession {
    pub(super) fn select(&mut self, selection: Selection) {
        self.selected = match selection {
            Selection::Entity(index) => Some(index),
            Selection::None => None,
        };
        (self.callbacks.on_select)(selection);
    }

    pub(super) fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub(super) fn set_selected(&mut self, selected: Option<usize>) {
        self.selected = selected;
    }

    pub(super) fn invalidate(&mut self, removed: usize) {
        if let Some(callback) = self.callbacks.on_selection_invalidated.as_mut() {
            callback(removed);
        }
    }
}

impl Level {
    pub fn is_editor_mode(&self) -> bool {
        self.editor.is_some()
    }

    pub fn selected_entity(&self) -> Option<usize> {
        self.editor.as_ref().and_then(EditorSession::selected)
    }

    pub fn manipulators(&self) -> Option<ManipulatorSet> {
        self.editor.as_ref().map(|session| session.manipulators)
    }

    /// Replace any previous session, freeze gameplay (portal travel, player and prop
    /// physics) and show the translate manipulator.
    pub fn enable_editor_mode(&mut self, callbacks: EditorCallbacks) {
        if self.is_disposed() {
            return;
        }
        if self.editor.is_some() {
            self.disable_editor_mode();
        }
        self.set_gameplay_frozen(true);
        let mode = GizmoMode::default();
        {
            let mut scene = self.services.scene.borrow_mut();
            scene.attach_gizmo(None);
            scene.set_gizmo_mode(Some(mode));
        }
        self.editor = Some(EditorSession { callbacks, selected: None, manipulators: ManipulatorSet::exclusive(mode) });
        info!(level = %self.doc.id, "editor mode enabled");
    }

    pub fn disable_editor_mode(&mut self) {
        if self.editor.take().is_none() {
            return;
        }
        {
            let mut scene = self.services.scene.borrow_mut();
            scene.attach_gizmo(None);
            scene.set_gizmo_mode(None);
        }
        self.set_gameplay_frozen(false);
        info!(level = %self.doc.id, "editor mode disabled");
    }

    fn set_gameplay_frozen(&mut self, frozen: bool) {
        let mut scene = self.services.scene.borrow_mut();
        for (_, portal) in self.registry.portals_mut() {
            portal.set_editor_mode(&mut *scene, frozen);
        }
        for (_, prop) in self.registry.props_mut() {
            prop.set_physics_enabled(&mut *scene, !frozen);
        }
        self.player.physics_enabled = !frozen;
        scene.set_player_physics(!frozen);
    }

    pub fn set_gizmo_mode(&mut self, mode: GizmoMode) {
        let Some(session) = self.editor.as_mut() else {
            debug!(mode = mode.label(), "gizmo mode ignored outside editor mode");
            return;
        };
        session.manipulators = ManipulatorSet::exclusive(mode);
        self.services.scene.borrow_mut().set_gizmo_mode(Some(mode));
    }

    /// Pointer activation on `picked` (`None` for empty space). Outside editor mode this
    /// is click-to-travel on portals.
    pub fn handle_pointer(&mut self, picked: Option<NodeId>) {
        if self.is_disposed() {
            return;
        }
        let Some(session) = self.editor.as_ref() else {
            let portal = picked
                .and_then(|node| self.registry.resolve_pick(&*self.services.scene.borrow(), node))
                .filter(|meta| meta.kind == EntityKind::Portal);
            if let Some(meta) = portal {
                self.activate_portal(meta.index);
            }
            return;
        };

        let manipulators = session.manipulators;
        let meta = {
            let scene = self.services.scene.borrow();
            let on_handle = GizmoMode::ALL.into_iter().filter(|&mode| manipulators.is_enabled(mode)).any(|mode| {
                GizmoAxis::ALL.into_iter().any(|axis| scene.gizmo_axis_hovered(mode, axis))
            });
            if on_handle {
                debug!("pointer on gizmo handle; selection unchanged");
                return;
            }
            picked.and_then(|node| self.registry.resolve_pick(&*scene, node))
        };

        let selection = match meta {
            Some(meta) => {
                let root = self.registry.object(meta.index);
                self.services.scene.borrow_mut().attach_gizmo(root);
                Selection::Entity(meta.index)
            }
            None => {
                self.services.scene.borrow_mut().attach_gizmo(None);
                Selection::None
            }
        };
        debug!(selection = selection.label(), index = selection.index(), "editor pick");
        if let Some(session) = self.editor.as_mut() {
            session.select(selection);
        }
    }

    /// Gizmo drag on the selected entity. Moves and drag ends publish the node's current
    /// transform and keep the document record in step.
    pub fn handle_gizmo_drag(&mut self, drag: GizmoDrag) {
        if !drag.publishes_transform() {
            return;
        }
        let Some(index) = self.selected_entity() else {
            return;
        };
        let Some(node) = self.registry.object(index) else {
            return;
        };
        let Some(transform) = self.services.scene.borrow().transform(node) else {
            return;
        };
        self.sync_live_transform(index, transform);
        if let Some(session) = self.editor.as_mut() {
            (session.callbacks.on_transform_change)(index, transform);
        }
    }

    /// Write a transform onto the live object at `index`. Omitted rotation or scale keep
    /// their current values.
    pub fn update_entity_transform(
        &mut self,
        index: usize,
        position: Vec3,
        rotation: Option<Vec3>,
        scale: Option<Vec3>,
    ) -> bool {
        let Some(node) = self.registry.object(index) else {
            debug!(index, "transform update for an empty slot");
            return false;
        };
        let transform = {
            let mut scene = self.services.scene.borrow_mut();
            let current = scene.transform(node).unwrap_or_default();
            let transform = Transform3D {
                position,
                rotation: rotation.unwrap_or(current.rotation),
                scale: scale.unwrap_or(current.scale),
            };
            scene.set_transform(node, transform);
            transform
        };
        self.sync_live_transform(index, transform);
        true
    }

    /// Push a transform the node already has into physics, portal motion and the document.
    fn sync_live_transform(&mut self, index: usize, transform: Transform3D) {
        if let Some(prop) = self.registry.prop(index) {
            prop.push_kinematic_target(&mut *self.services.scene.borrow_mut(), transform);
        }
        if let Some(portal) = self.registry.portal_mut(index) {
            portal.set_base_position(transform.position);
        }
        if let Some(spawn) = self.doc.entities.get_mut(index) {
            spawn.write_transform(&transform);
        }
    }
}

use tracing::{debug, info, warn};

use super::editor::Selection;
use super::registry::LiveEntity;
use super::runtime::Level;
use crate::entity::SpawnError;
use crate::level::document::{EntityKind, EntitySpawn, NpcSpawn, PropSpawn};
use crate::scene::{NodeId, Transform3D};

impl Level {
    /// Spawn `spawn` into slot `index` (clamped to the end of the list), moving every
    /// entity at or above it up by one. Returns the NPC's animation names, empty otherwise.
    /// A failed spawn leaves the level exactly as it was.
    pub async fn add_entity_live(&mut self, index: usize, spawn: EntitySpawn) -> Result<Vec<String>, SpawnError> {
        if self.is_disposed() {
            return Err(SpawnError::LevelDisposed);
        }
        let index = index.min(self.doc.entities.len());
        let shifted = index < self.doc.entities.len();
        if shifted {
            self.shift_from(index, 1);
        }
        self.doc.entities.insert(index, spawn.clone());
        match self.spawn_at(index, &spawn).await {
            Ok(animations) => {
                self.sync_npc_names();
                info!(level = %self.doc.id, index, kind = spawn.kind().label(), "entity added");
                Ok(animations)
            }
            Err(err) => {
                warn!(level = %self.doc.id, index, error = %err, "live add failed");
                self.doc.entities.remove(index);
                if shifted {
                    self.shift_from(index + 1, -1);
                    self.sync_npc_names();
                }
                Err(err)
            }
        }
    }

    /// Dispose the entity at `index` and close the gap. Every later index moves down by one.
    pub fn remove_entity_live(&mut self, index: usize) -> bool {
        if self.is_disposed() || index >= self.doc.entities.len() {
            return false;
        }
        if let Some(mut entity) = self.registry.take(index) {
            entity.dispose(&mut *self.services.scene.borrow_mut());
        }
        self.doc.entities.remove(index);
        self.triggers.forget_visit(index);
        if self.talking_npc == Some(index) {
            self.talking_npc = None;
        }

        let was_selected = self.selected_entity() == Some(index);
        if was_selected {
            self.services.scene.borrow_mut().attach_gizmo(None);
            if let Some(session) = self.editor.as_mut() {
                session.select(Selection::None);
            }
        }
        self.shift_from(index + 1, -1);
        self.sync_npc_names();
        if let Some(session) = self.editor.as_mut() {
            session.invalidate(index);
        }
        info!(level = %self.doc.id, index, remaining = self.registry.len(), "entity removed");
        true
    }

    /// Unnamed NPCs are known as `npc_<index>`; keep the live names on their current slot.
    fn sync_npc_names(&mut self) {
        let names: Vec<(usize, String)> = self.doc.npc_names().collect();
        self.registry.sync_npc_names(names);
    }

    /// Move registry slots, visit flags, the talking NPC and the editor selection for every
    /// index at or above `from`.
    fn shift_from(&mut self, from: usize, delta: isize) {
        self.registry.shift_indices(from, delta);
        self.triggers.shift_visits(from, delta);
        let shift = |index: usize| if index >= from { index.checked_add_signed(delta) } else { Some(index) };
        self.talking_npc = self.talking_npc.and_then(shift);
        if let Some(session) = self.editor.as_mut() {
            let selected = session.selected().and_then(shift);
            session.set_selected(selected);
        }
    }

    /// Replace the NPC at `index` with a new model at the same place, under the same name.
    pub async fn swap_npc_model(
        &mut self,
        index: usize,
        asset_path: &str,
        scale: Option<f32>,
    ) -> Result<Vec<String>, SpawnError> {
        if self.is_disposed() {
            return Err(SpawnError::LevelDisposed);
        }
        let Some(EntitySpawn::Npc(current)) = self.doc.entities.get(index).cloned() else {
            return Err(SpawnError::NotFound { index, expected: EntityKind::Npc });
        };
        let live = self.live_transform(index);
        let name = self.registry.npc(index).map_or_else(|| current.display_name(index), |npc| npc.name().to_string());
        let spawn = NpcSpawn {
            model: None,
            asset_path: Some(asset_path.to_string()),
            position: live.map_or(current.position, |t| t.position.into()),
            rotation: live.map(|t| t.rotation.into()).or(current.rotation),
            scale: scale.or(current.scale),
            ..current
        };
        let npc = self.factory.spawn_npc(&self.services.scene, &name, &spawn, &self.cancel).await?;
        let animations = npc.animation_names();
        let root = npc.root();
        self.replace_live(index, LiveEntity::Npc(npc), root);
        if self.talking_npc == Some(index) {
            self.talking_npc = None;
        }
        self.doc.entities[index] = EntitySpawn::Npc(spawn);
        info!(level = %self.doc.id, index, npc = %name, asset = asset_path, "npc model swapped");
        Ok(animations)
    }

    /// Replace the prop at `index` with a new mesh, keeping its position, rotation, scale and
    /// physics settings.
    pub async fn swap_prop_model(&mut self, index: usize, asset_path: &str) -> Result<(), SpawnError> {
        if self.is_disposed() {
            return Err(SpawnError::LevelDisposed);
        }
        let Some(EntitySpawn::Prop(current)) = self.doc.entities.get(index).cloned() else {
            return Err(SpawnError::NotFound { index, expected: EntityKind::Prop });
        };
        let spawn = match self.live_transform(index) {
            Some(live) => PropSpawn {
                asset_path: asset_path.to_string(),
                position: live.position.into(),
                rotation: Some(live.rotation.into()),
                scale: Some(live.scale.into()),
                ..current
            },
            None => PropSpawn { asset_path: asset_path.to_string(), ..current },
        };
        let mut prop = self.factory.spawn_prop(&self.services.scene, &spawn, &self.cancel).await?;
        if self.is_editor_mode() {
            prop.set_physics_enabled(&mut *self.services.scene.borrow_mut(), false);
        }
        let root = prop.root();
        self.replace_live(index, LiveEntity::Prop(prop), root);
        self.doc.entities[index] = EntitySpawn::Prop(spawn);
        info!(level = %self.doc.id, index, asset = asset_path, "prop model swapped");
        Ok(())
    }

    /// Append a copy of the entity at `index` using its live transform. Returns the new index.
    pub async fn duplicate_entity_live(&mut self, index: usize) -> Result<usize, SpawnError> {
        let Some(mut copy) = self.doc.entities.get(index).cloned() else {
            return Err(SpawnError::EmptySlot { index });
        };
        if let Some(live) = self.live_transform(index) {
            copy.write_transform(&live);
        }
        let target = self.doc.entities.len();
        self.add_entity_live(target, copy).await?;
        debug!(source = index, copy = target, "entity duplicated");
        Ok(target)
    }

    pub fn get_entity_animation_names(&self, index: usize) -> Vec<String> {
        self.registry.npc(index).map(|npc| npc.animation_names()).unwrap_or_default()
    }

    pub fn play_entity_animation(&mut self, index: usize, name: &str) -> bool {
        match self.registry.npc_mut(index) {
            Some(npc) => npc.play_animation(&mut *self.services.scene.borrow_mut(), name),
            None => false,
        }
    }

    fn live_transform(&self, index: usize) -> Option<Transform3D> {
        let node = self.registry.object(index)?;
        self.services.scene.borrow().transform(node)
    }

    /// Install `entity` at `index`, disposing the previous occupant and moving the gizmo
    /// along if it was attached to the old object.
    fn replace_live(&mut self, index: usize, entity: LiveEntity, root: NodeId) {
        let mut scene = self.services.scene.borrow_mut();
        if let Some(mut old) = self.registry.insert(index, entity) {
            old.dispose(&mut *scene);
        }
        if self.selected_entity() == Some(index) {
            scene.attach_gizmo(Some(root));
        }
    }
}

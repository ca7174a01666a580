use glam::Vec3;
use thiserror::Error;
use tracing::debug;

use super::npc::{Npc, NpcOptions};
use super::portal::{Portal, PortalMotion};
use super::prop::Prop;
use crate::catalog::{normalize_asset_path, ModelPolicy, NpcCatalog};
use crate::level::document::{EntityKind, NpcSpawn, PropSpawn};
use crate::scene::{MeshBundle, SceneBackend, Transform3D};
use crate::services::{LoadCancel, SharedScene};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("invalid spawn: neither catalog key {key:?} nor asset path {path:?} resolves")]
    InvalidSpawn { key: Option<String>, path: Option<String> },
    #[error("failed to load '{path}'")]
    AssetLoad {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("spawn of '{path}' cancelled while loading")]
    Cancelled { path: String },
    #[error("no {} at index {index}", .expected.label())]
    NotFound { index: usize, expected: EntityKind },
    #[error("no entity at index {index}")]
    EmptySlot { index: usize },
    #[error("level is disposed")]
    LevelDisposed,
}

/// Turns spawn records into live wrappers.
pub struct EntityFactory {
    catalog: NpcCatalog,
    portal_motion: PortalMotion,
}

impl EntityFactory {
    pub fn new(catalog: NpcCatalog, portal_motion: PortalMotion) -> Self {
        Self { catalog, portal_motion }
    }

    pub fn catalog(&self) -> &NpcCatalog {
        &self.catalog
    }

    pub fn resolve_npc(&self, spawn: &NpcSpawn) -> Result<ModelPolicy, SpawnError> {
        self.catalog.resolve(spawn.model.as_deref(), spawn.asset_path.as_deref()).ok_or_else(|| {
            SpawnError::InvalidSpawn { key: spawn.model.clone(), path: spawn.asset_path.clone() }
        })
    }

    pub async fn spawn_npc(
        &self,
        scene: &SharedScene,
        name: &str,
        spawn: &NpcSpawn,
        cancel: &LoadCancel,
    ) -> Result<Npc, SpawnError> {
        let policy = self.resolve_npc(spawn)?;
        let bundle = load_bundle(scene, &policy.asset_path, cancel).await?;
        let options = NpcOptions {
            scale: spawn.scale.unwrap_or(policy.scale),
            cast_shadows: policy.cast_shadows,
            idle_animation: spawn.idle_animation.clone().or(policy.idle_animation),
            interact_animation: spawn.interact_animation.clone().or(policy.interact_animation),
        };
        let mut scene = scene.borrow_mut();
        let placement = Transform3D {
            position: spawn.position.into(),
            rotation: spawn.rotation.map(Into::into).unwrap_or_default(),
            scale: Vec3::splat(options.scale),
        };
        scene.set_transform(bundle.root, placement);
        Ok(Npc::new(&mut *scene, name, policy.asset_path, bundle, &options))
    }

    /// No asset load involved, so this completes immediately.
    pub fn spawn_portal(
        &self,
        scene: &mut dyn SceneBackend,
        position: Vec3,
        target_level: &str,
        editor_mode: bool,
    ) -> Portal {
        Portal::new(scene, position, target_level, editor_mode, self.portal_motion)
    }

    pub async fn spawn_prop(
        &self,
        scene: &SharedScene,
        spawn: &PropSpawn,
        cancel: &LoadCancel,
    ) -> Result<Prop, SpawnError> {
        let path = normalize_asset_path(&spawn.asset_path)
            .ok_or_else(|| SpawnError::InvalidSpawn { key: None, path: Some(spawn.asset_path.clone()) })?;
        let bundle = load_bundle(scene, &path, cancel).await?;
        let mut scene = scene.borrow_mut();
        Ok(Prop::new(&mut *scene, path, bundle, spawn))
    }
}

/// Awaits the import without holding the scene borrow, then discards the result if the
/// load was cancelled in the meantime.
pub(crate) async fn load_bundle(
    scene: &SharedScene,
    path: &str,
    cancel: &LoadCancel,
) -> Result<MeshBundle, SpawnError> {
    let pending = scene.borrow_mut().load_mesh(path);
    let bundle = pending.await.map_err(|source| SpawnError::AssetLoad { path: path.to_string(), source })?;
    if cancel.is_cancelled() {
        debug!(%path, "discarding mesh loaded after cancellation");
        discard_bundle(&mut *scene.borrow_mut(), bundle);
        return Err(SpawnError::Cancelled { path: path.to_string() });
    }
    Ok(bundle)
}

fn discard_bundle(scene: &mut dyn SceneBackend, bundle: MeshBundle) {
    for clip in &bundle.animations {
        scene.dispose_animation(clip.handle);
    }
    scene.dispose_node(bundle.root);
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dialogue::QuestGraph;
use crate::scene::{ColliderShape, Transform3D};

/// Serialized level as authored in the editor. Entity order defines the runtime index of
/// every spawn for the lifetime of a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub settings: LevelSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_start: Option<Vec3Data>,
    #[serde(default)]
    pub entities: Vec<EntitySpawn>,
    #[serde(default)]
    pub dialogues: Vec<Dialogue>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

const fn default_ambient_intensity() -> f32 {
    0.25
}

fn default_clear_color() -> [f32; 4] {
    [0.02, 0.02, 0.03, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSettings {
    #[serde(default = "default_ambient_intensity")]
    pub ambient_intensity: f32,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub fog: FogSettings,
    #[serde(default)]
    pub post_process: PostProcessSettings,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            ambient_intensity: default_ambient_intensity(),
            clear_color: default_clear_color(),
            fog: FogSettings::default(),
            post_process: PostProcessSettings::default(),
        }
    }
}

const fn default_fog_density() -> f32 {
    0.03
}

fn default_fog_color() -> [f32; 3] {
    [0.05, 0.05, 0.07]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fog_density")]
    pub density: f32,
    #[serde(default = "default_fog_color")]
    pub color: [f32; 3],
}

impl Default for FogSettings {
    fn default() -> Self {
        Self { enabled: false, density: default_fog_density(), color: default_fog_color() }
    }
}

const fn default_one() -> f32 {
    1.0
}

const fn default_vignette_weight() -> f32 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessSettings {
    #[serde(default = "default_one")]
    pub contrast: f32,
    #[serde(default = "default_one")]
    pub exposure: f32,
    #[serde(default = "default_vignette_weight")]
    pub vignette_weight: f32,
    #[serde(default)]
    pub grain: f32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            contrast: default_one(),
            exposure: default_one(),
            vignette_weight: default_vignette_weight(),
            grain: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub asset_path: String,
    #[serde(default = "default_one")]
    pub scale: f32,
    #[serde(default)]
    pub offset: Vec3Data,
}

/// One entity slot. The variant never changes in place; retyping is remove + add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntitySpawn {
    Npc(NpcSpawn),
    Portal(PortalSpawn),
    Prop(PropSpawn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Npc,
    Portal,
    Prop,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Npc => "npc",
            EntityKind::Portal => "portal",
            EntityKind::Prop => "prop",
        }
    }
}

impl EntitySpawn {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySpawn::Npc(_) => EntityKind::Npc,
            EntitySpawn::Portal(_) => EntityKind::Portal,
            EntitySpawn::Prop(_) => EntityKind::Prop,
        }
    }

    pub fn position(&self) -> glam::Vec3 {
        match self {
            EntitySpawn::Npc(npc) => npc.position.into(),
            EntitySpawn::Portal(portal) => portal.position.into(),
            EntitySpawn::Prop(prop) => prop.position.into(),
        }
    }

    /// Copy a live transform back into the record, keeping fields the variant cannot hold.
    pub fn write_transform(&mut self, transform: &Transform3D) {
        match self {
            EntitySpawn::Npc(npc) => {
                npc.position = transform.position.into();
                npc.rotation = Some(transform.rotation.into());
                npc.scale = Some(transform.scale.x);
            }
            EntitySpawn::Portal(portal) => portal.position = transform.position.into(),
            EntitySpawn::Prop(prop) => {
                prop.position = transform.position.into();
                prop.rotation = Some(transform.rotation.into());
                prop.scale = Some(transform.scale.into());
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcSpawn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Catalog key, looked up case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_path: Option<String>,
    #[serde(default)]
    pub position: Vec3Data,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rewards: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_dialogue: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_dialogue: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_animation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact_animation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest: Option<QuestGraph>,
}

impl NpcSpawn {
    pub fn display_name(&self, index: usize) -> String {
        self.name.clone().filter(|name| !name.trim().is_empty()).unwrap_or_else(|| format!("npc_{index}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalSpawn {
    #[serde(default)]
    pub position: Vec3Data,
    pub target_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSpawn {
    pub asset_path: String,
    #[serde(default)]
    pub position: Vec3Data,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<PhysicsDescriptor>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsDescriptor {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Zero is static, anything else dynamic.
    #[serde(default)]
    pub mass: f32,
    #[serde(default)]
    pub shape: ColliderShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default)]
    pub lines: Vec<String>,
}

const fn default_trigger_radius() -> f32 {
    3.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    /// Display name of the NPC the radius is centred on.
    pub target: String,
    #[serde(default = "default_trigger_radius")]
    pub radius: f32,
    #[serde(default = "default_true")]
    pub once: bool,
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerAction {
    Dialogue {
        id: String,
    },
    Sound {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume: Option<f32>,
    },
    Light {
        intensity: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Random pick between a dim and a bright range every frame.
    Flicker {
        #[serde(default = "Effect::default_flicker_low")]
        low: [f32; 2],
        #[serde(default = "Effect::default_flicker_high")]
        high: [f32; 2],
        #[serde(default = "Effect::default_flicker_chance")]
        chance: f32,
    },
    Heartbeat {
        #[serde(default = "Effect::default_heartbeat_base")]
        base: f32,
        #[serde(default = "Effect::default_heartbeat_amplitude")]
        amplitude: f32,
        #[serde(default = "default_one")]
        rate: f32,
    },
    Shake {
        #[serde(default = "Effect::default_shake_intensity")]
        intensity: f32,
    },
    Spotlight {
        intensity: f32,
    },
}

impl Effect {
    fn default_flicker_low() -> [f32; 2] {
        [0.1, 0.4]
    }

    fn default_flicker_high() -> [f32; 2] {
        [0.9, 1.2]
    }

    const fn default_flicker_chance() -> f32 {
        0.1
    }

    const fn default_heartbeat_base() -> f32 {
        1.5
    }

    const fn default_heartbeat_amplitude() -> f32 {
        0.6
    }

    const fn default_shake_intensity() -> f32 {
        0.01
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3Data {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<glam::Vec3> for Vec3Data {
    fn from(value: glam::Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for glam::Vec3 {
    fn from(value: Vec3Data) -> Self {
        glam::Vec3::new(value.x, value.y, value.z)
    }
}

impl LevelDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Parsing level document")
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading level file {}", path.display()))?;
        let doc = serde_json::from_slice::<LevelDocument>(&bytes)
            .with_context(|| format!("Parsing level file {}", path.display()))?;
        Ok(doc)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating level directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing level file {}", path.display()))?;
        Ok(())
    }

    pub fn dialogue(&self, id: &str) -> Option<&Dialogue> {
        self.dialogues.iter().find(|dialogue| dialogue.id == id)
    }

    /// NPC display names in entity order, with their indices.
    pub fn npc_names(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        self.entities.iter().enumerate().filter_map(|(index, spawn)| match spawn {
            EntitySpawn::Npc(npc) => Some((index, npc.display_name(index))),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_variants_are_tagged_by_type() {
        let doc = LevelDocument::from_json_str(
            r#"{
                "id": "ward",
                "entities": [
                    {"type": "npc", "name": "Nurse", "model": "nurse", "position": {"x": 1, "y": 0, "z": 2}},
                    {"type": "portal", "position": {"x": 3, "y": 0, "z": 0}, "target_level": "level2"},
                    {"type": "prop", "asset_path": "/assets/bed.glb", "physics": {"mass": 0}}
                ]
            }"#,
        )
        .expect("document parses");
        let kinds: Vec<_> = doc.entities.iter().map(EntitySpawn::kind).collect();
        assert_eq!(kinds, vec![EntityKind::Npc, EntityKind::Portal, EntityKind::Prop]);
        match &doc.entities[2] {
            EntitySpawn::Prop(prop) => {
                let physics = prop.physics.as_ref().expect("physics block");
                assert!(physics.enabled, "physics defaults to enabled");
                assert_eq!(physics.shape, ColliderShape::Mesh);
            }
            other => panic!("expected prop, got {other:?}"),
        }
        assert_eq!(doc.settings, LevelSettings::default());
    }

    #[test]
    fn npc_names_fall_back_to_index() {
        let npc = NpcSpawn { name: Some("  ".into()), ..NpcSpawn::default() };
        assert_eq!(npc.display_name(4), "npc_4");
    }

    #[test]
    fn unknown_spawn_type_fails_to_parse() {
        let err = LevelDocument::from_json_str(r#"{"id": "x", "entities": [{"type": "ghost"}]}"#).unwrap_err();
        assert!(format!("{err:#}").contains("Parsing level document"));
    }
}

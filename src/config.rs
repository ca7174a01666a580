use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::catalog::{CatalogEntry, NpcCatalog};
use crate::entity::PortalMotion;

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "PlayerConfig::default_spotlight_intensity")]
    pub spotlight_intensity: f32,
    #[serde(default = "PlayerConfig::default_vignette_weight")]
    pub vignette_weight: f32,
}

impl PlayerConfig {
    const fn default_spotlight_intensity() -> f32 {
        1.0
    }

    const fn default_vignette_weight() -> f32 {
        1.5
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spotlight_intensity: Self::default_spotlight_intensity(),
            vignette_weight: Self::default_vignette_weight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "AudioConfig::default_teleport_sound")]
    pub teleport_sound: String,
    #[serde(default = "AudioConfig::default_music_volume")]
    pub music_volume: f32,
}

impl AudioConfig {
    fn default_teleport_sound() -> String {
        "teleport".to_string()
    }

    const fn default_music_volume() -> f32 {
        0.5
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { teleport_sound: Self::default_teleport_sound(), music_volume: Self::default_music_volume() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Distance at which walking up to an NPC starts its conversation.
    #[serde(default = "RuntimeConfig::default_interaction_radius")]
    pub interaction_radius: f32,
    #[serde(default)]
    pub portal: PortalMotion,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    /// Extra or overriding NPC catalog entries keyed by model name.
    #[serde(default)]
    pub catalog: HashMap<String, CatalogEntry>,
    #[serde(default)]
    pub rng_seed: Option<u64>,
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl RuntimeConfig {
    const fn default_interaction_radius() -> f32 {
        3.0
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interaction_radius: Self::default_interaction_radius(),
            portal: PortalMotion::default(),
            player: PlayerConfig::default(),
            audio: AudioConfig::default(),
            catalog: HashMap::new(),
            rng_seed: None,
            log_filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfigOverrides {
    pub interaction_radius: Option<f32>,
    pub rng_seed: Option<u64>,
    pub log_filter: Option<String>,
}

impl RuntimeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Config load error: {err:#}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &RuntimeConfigOverrides) {
        if let Some(radius) = overrides.interaction_radius {
            self.interaction_radius = radius;
        }
        if let Some(seed) = overrides.rng_seed {
            self.rng_seed = Some(seed);
        }
        if let Some(filter) = overrides.log_filter.as_ref() {
            self.log_filter = Some(filter.clone());
        }
    }

    /// Built-in models plus whatever the config adds or overrides.
    pub fn npc_catalog(&self) -> NpcCatalog {
        let mut catalog = NpcCatalog::builtin();
        catalog.extend(&self.catalog);
        catalog
    }
}

impl RuntimeConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.interaction_radius.is_none() && self.rng_seed.is_none() && self.log_filter.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.interaction_radius.is_some() {
            fields.push("interaction_radius");
        }
        if self.rng_seed.is_some() {
            fields.push("rng_seed");
        }
        if self.log_filter.is_some() {
            fields.push("log_filter");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(
            file,
            r#"{{"interaction_radius": 4.5, "catalog": {{"Ghoul": {{"asset_path": "assets/ghoul.glb"}}}}}}"#
        )
        .expect("write config");
        let cfg = RuntimeConfig::load(file.path()).expect("config loads");
        assert_eq!(cfg.interaction_radius, 4.5);
        assert_eq!(cfg.audio.teleport_sound, "teleport");
        let catalog = cfg.npc_catalog();
        assert!(catalog.get("ghoul").is_some(), "config entries join the builtin catalog");
        assert!(catalog.get("nurse").is_some());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = RuntimeConfig::load_or_default("/definitely/not/here.json");
        assert_eq!(cfg.interaction_radius, 3.0);
    }

    #[test]
    fn overrides_only_touch_present_fields() {
        let mut cfg = RuntimeConfig::default();
        let overrides = RuntimeConfigOverrides { rng_seed: Some(7), ..Default::default() };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.rng_seed, Some(7));
        assert_eq!(cfg.interaction_radius, 3.0);
        assert_eq!(overrides.applied_fields(), vec!["rng_seed"]);
    }
}

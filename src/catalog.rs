use serde::Deserialize;
use std::collections::HashMap;

/// Idle names tried, in order, when a model has no explicit idle animation.
pub const IDLE_NAME_CANDIDATES: [&str; 4] = ["idle", "breath", "stand", "rest"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub asset_path: String,
    #[serde(default)]
    pub idle_animation: Option<String>,
    #[serde(default)]
    pub interact_animation: Option<String>,
    #[serde(default = "CatalogEntry::default_cast_shadows")]
    pub cast_shadows: bool,
    #[serde(default = "CatalogEntry::default_scale")]
    pub scale: f32,
}

impl CatalogEntry {
    const fn default_cast_shadows() -> bool {
        true
    }

    const fn default_scale() -> f32 {
        1.0
    }

    fn builtin(asset_path: &str, idle: &str, interact: Option<&str>) -> Self {
        Self {
            asset_path: asset_path.to_string(),
            idle_animation: Some(idle.to_string()),
            interact_animation: interact.map(str::to_string),
            cast_shadows: true,
            scale: 1.0,
        }
    }
}

/// What the factory needs to materialize an NPC model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPolicy {
    pub asset_path: String,
    pub idle_animation: Option<String>,
    pub interact_animation: Option<String>,
    pub cast_shadows: bool,
    pub scale: f32,
}

impl From<&CatalogEntry> for ModelPolicy {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            asset_path: normalize_asset_path(&entry.asset_path).unwrap_or_else(|| entry.asset_path.clone()),
            idle_animation: entry.idle_animation.clone(),
            interact_animation: entry.interact_animation.clone(),
            cast_shadows: entry.cast_shadows,
            scale: entry.scale,
        }
    }
}

/// Named NPC models keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct NpcCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl NpcCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert("nurse", CatalogEntry::builtin("/assets/characters/nurse.glb", "Idle", Some("Talk")));
        catalog.insert("caretaker", CatalogEntry::builtin("/assets/characters/caretaker.glb", "Idle", Some("Wave")));
        catalog.insert("child", CatalogEntry::builtin("/assets/characters/child.glb", "Breathing", None));
        catalog.insert("shade", CatalogEntry::builtin("/assets/characters/shade.glb", "Float", None));
        catalog
    }

    pub fn insert(&mut self, key: &str, entry: CatalogEntry) {
        self.entries.insert(key.trim().to_ascii_lowercase(), entry);
    }

    pub fn extend(&mut self, entries: &HashMap<String, CatalogEntry>) {
        for (key, entry) in entries {
            self.insert(key, entry.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(&key.trim().to_ascii_lowercase())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Catalog key first, then a direct asset path with the generic policy.
    pub fn resolve(&self, key: Option<&str>, asset_path: Option<&str>) -> Option<ModelPolicy> {
        if let Some(entry) = key.and_then(|key| self.get(key)) {
            return Some(ModelPolicy::from(entry));
        }
        let asset_path = normalize_asset_path(asset_path?)?;
        Some(ModelPolicy {
            asset_path,
            idle_animation: None,
            interact_animation: None,
            cast_shadows: true,
            scale: 1.0,
        })
    }
}

/// Canonical root-relative form: forward slashes, leading `/`, no `.`/`..` or empty
/// segments and no `public/` prefix. URLs pass through untouched.
pub fn normalize_asset_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") || trimmed.starts_with("data:") || trimmed.starts_with("blob:") {
        return Some(trimmed.to_string());
    }
    let unified = trimmed.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.first() == Some(&"public") {
        parts.remove(0);
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("/{}", parts.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_and_windows_paths() {
        assert_eq!(normalize_asset_path("assets/models/a.glb").as_deref(), Some("/assets/models/a.glb"));
        assert_eq!(normalize_asset_path("./public/assets//a.glb").as_deref(), Some("/assets/a.glb"));
        assert_eq!(normalize_asset_path("assets\\x\\..\\b.glb").as_deref(), Some("/assets/b.glb"));
        assert_eq!(normalize_asset_path("https://cdn/x.glb").as_deref(), Some("https://cdn/x.glb"));
        assert_eq!(normalize_asset_path("  "), None);
        assert_eq!(normalize_asset_path("./"), None);
    }

    #[test]
    fn catalog_keys_are_case_insensitive_and_win_over_paths() {
        let catalog = NpcCatalog::builtin();
        let policy = catalog.resolve(Some("NuRsE"), Some("/assets/other.glb")).expect("catalog hit");
        assert_eq!(policy.asset_path, "/assets/characters/nurse.glb");
        assert_eq!(policy.interact_animation.as_deref(), Some("Talk"));
    }

    #[test]
    fn unknown_key_falls_back_to_asset_path() {
        let catalog = NpcCatalog::builtin();
        let policy = catalog.resolve(Some("ghoul"), Some("assets/ghoul.glb")).expect("path fallback");
        assert_eq!(policy.asset_path, "/assets/ghoul.glb");
        assert!(policy.cast_shadows);
        assert!(policy.idle_animation.is_none());
        assert!(catalog.resolve(Some("ghoul"), None).is_none());
    }
}

//! Composition root for a play session: owns the shared services, the document store and
//! the currently loaded level, and turns portal requests into level transitions.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::events::LevelEvent;
use crate::level::{Level, LevelDocument, LoadSummary};
use crate::services::Services;

pub struct LevelManager {
    services: Services,
    config: RuntimeConfig,
    documents: BTreeMap<String, LevelDocument>,
    sources: HashMap<String, PathBuf>,
    current: Option<Level>,
    pending_transition: Option<String>,
}

impl LevelManager {
    pub fn new(services: Services, config: RuntimeConfig) -> Self {
        Self {
            services,
            config,
            documents: BTreeMap::new(),
            sources: HashMap::new(),
            current: None,
            pending_transition: None,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Add or replace a document in the store. Returns the previous version.
    pub fn register(&mut self, doc: LevelDocument) -> Option<LevelDocument> {
        self.documents.insert(doc.id.clone(), doc)
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let doc = LevelDocument::load_from_path(path)?;
        let id = doc.id.clone();
        self.sources.insert(id.clone(), path.to_path_buf());
        self.register(doc);
        Ok(id)
    }

    /// Register every `*.json` document in `dir`. Unparseable files are logged and skipped.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).with_context(|| format!("Reading level directory {}", dir.display()))?;
        let mut loaded = 0;
        for entry in entries {
            let path = entry.with_context(|| format!("Listing level directory {}", dir.display()))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.register_file(&path) {
                Ok(id) => {
                    info!(level = %id, path = %path.display(), "level document registered");
                    loaded += 1;
                }
                Err(err) => warn!(path = %path.display(), "skipping level document: {err:#}"),
            }
        }
        Ok(loaded)
    }

    pub fn document(&self, id: &str) -> Option<&LevelDocument> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &LevelDocument> {
        self.documents.values()
    }

    pub fn level_ids(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    pub fn source_path(&self, id: &str) -> Option<&Path> {
        self.sources.get(id).map(PathBuf::as_path)
    }

    pub fn current(&self) -> Option<&Level> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Level> {
        self.current.as_mut()
    }

    pub fn pending_transition(&self) -> Option<&str> {
        self.pending_transition.as_deref()
    }

    /// Dispose the current level and bring up `id`. An unknown id is logged and leaves the
    /// current level running.
    pub async fn load_level(&mut self, id: &str) -> Result<Option<LoadSummary>> {
        let Some(doc) = self.documents.get(id).cloned() else {
            warn!(level = id, "requested level is not registered");
            return Ok(None);
        };
        if let Some(mut previous) = self.current.take() {
            info!(from = %previous.id(), to = id, "leaving level");
            previous.dispose();
        }
        let mut level = Level::new(doc, self.services.clone(), self.config.clone());
        let summary = level.load().await.with_context(|| format!("Loading level '{id}'"))?;
        if summary.cancelled {
            return Ok(Some(summary));
        }
        level.start();
        self.current = Some(level);
        Ok(Some(summary))
    }

    /// Advance the current level one frame and return what it reported. Portal requests
    /// are queued for [`LevelManager::process_transitions`].
    pub fn update(&mut self, dt: f32) -> Vec<LevelEvent> {
        let Some(level) = self.current.as_mut() else {
            return Vec::new();
        };
        level.update(dt);
        let events = level.drain_events();
        for event in &events {
            if let LevelEvent::TransitionRequested { target } = event {
                self.pending_transition = Some(target.clone());
            }
        }
        events
    }

    pub fn render(&mut self) {
        if let Some(level) = self.current.as_mut() {
            level.render();
        }
    }

    pub async fn process_transitions(&mut self) -> Result<Option<LoadSummary>> {
        match self.pending_transition.take() {
            Some(target) => self.load_level(&target).await,
            None => Ok(None),
        }
    }

    /// Store `doc` and push it into the running level if it is the one playing.
    pub fn hot_update_current(&mut self, doc: LevelDocument) -> bool {
        let applies = self.current.as_ref().map_or(false, |level| level.id() == doc.id);
        self.register(doc.clone());
        match self.current.as_mut() {
            Some(level) if applies => {
                level.hot_update(doc);
                true
            }
            _ => false,
        }
    }

    /// Re-read the file `id` was registered from and hot-update it if it is playing.
    pub fn reload_from_disk(&mut self, id: &str) -> Result<bool> {
        let path = self.sources.get(id).cloned().with_context(|| format!("Level '{id}' has no source file"))?;
        let doc = LevelDocument::load_from_path(&path)?;
        if doc.id != id {
            warn!(expected = id, found = %doc.id, "level file changed its id");
        }
        Ok(self.hot_update_current(doc))
    }

    pub fn dispose(&mut self) {
        if let Some(mut level) = self.current.take() {
            level.dispose();
        }
        self.pending_transition = None;
    }
}

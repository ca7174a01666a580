use anyhow::{anyhow, Result};
use notify::event::ModifyKind;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const LEVEL_HOT_RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct LevelWatchEntry {
    level: String,
    original: PathBuf,
}

/// Watches level documents on disk and reports which level ids changed.
pub struct LevelHotReload {
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watched: HashMap<PathBuf, LevelWatchEntry>,
    last_event: HashMap<String, Instant>,
}

pub(crate) fn normalize_watch_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path.to_path_buf(),
        }
    };
    fs::canonicalize(&absolute).unwrap_or(absolute)
}

impl LevelHotReload {
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        if let Err(err) = watcher.configure(
            NotifyConfig::default().with_compare_contents(true).with_poll_interval(Duration::from_millis(250)),
        ) {
            warn!(target: "watch", "level watcher configuration warning: {err}");
        }
        Ok(Self { watcher, rx, watched: HashMap::new(), last_event: HashMap::new() })
    }

    /// Start watching `path` as the document of `level`. Re-watching a level moves it.
    pub fn watch(&mut self, level: &str, path: impl AsRef<Path>) -> Result<()> {
        let original = path.as_ref().to_path_buf();
        let normalized = normalize_watch_path(&original);
        if self.watched.get(&normalized).map_or(false, |entry| entry.level == level) {
            return Ok(());
        }
        self.unwatch(level)?;
        self.watcher
            .watch(&original, RecursiveMode::NonRecursive)
            .map_err(|err| anyhow!("watch failed for '{}': {err}", original.display()))?;
        debug!(target: "watch", level, path = %original.display(), "watching level document");
        self.watched.insert(normalized, LevelWatchEntry { level: level.to_string(), original });
        Ok(())
    }

    pub fn unwatch(&mut self, level: &str) -> Result<()> {
        let stale: Vec<PathBuf> =
            self.watched.iter().filter(|(_, entry)| entry.level == level).map(|(path, _)| path.clone()).collect();
        for normalized in stale {
            if let Some(entry) = self.watched.remove(&normalized) {
                self.watcher
                    .unwatch(&entry.original)
                    .map_err(|err| anyhow!("unwatch failed for '{}': {err}", entry.original.display()))?;
            }
        }
        self.last_event.remove(level);
        Ok(())
    }

    pub fn watched_levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = self.watched.values().map(|entry| entry.level.clone()).collect();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Level ids whose documents changed since the last call, debounced per level.
    pub fn drain_changed(&mut self) -> Vec<String> {
        let mut levels = Vec::new();
        while let Ok(res) = self.rx.try_recv() {
            match res {
                Ok(event) => {
                    if !Self::is_relevant(&event.kind) {
                        continue;
                    }
                    for path in event.paths {
                        let Some(level) = self.resolve_path(&path) else {
                            continue;
                        };
                        let now = Instant::now();
                        let accept = match self.last_event.get(&level) {
                            Some(prev) => now.duration_since(*prev) >= LEVEL_HOT_RELOAD_DEBOUNCE,
                            None => true,
                        };
                        if accept && !levels.contains(&level) {
                            levels.push(level.clone());
                            self.last_event.insert(level, now);
                        }
                    }
                }
                Err(err) => warn!(target: "watch", "level watcher error: {err}"),
            }
        }
        levels
    }

    fn resolve_path(&self, path: &Path) -> Option<String> {
        let normalized = normalize_watch_path(path);
        if let Some(entry) = self.watched.get(&normalized) {
            return Some(entry.level.clone());
        }
        self.watched.values().find(|entry| entry.original == path).map(|entry| entry.level.clone())
    }

    fn is_relevant(kind: &EventKind) -> bool {
        matches!(
            kind,
            EventKind::Modify(ModifyKind::Data(_))
                | EventKind::Modify(ModifyKind::Name(_))
                | EventKind::Modify(ModifyKind::Any)
                | EventKind::Create(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_normalize_to_absolute() {
        let normalized = normalize_watch_path(Path::new("levels/ward.json"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn rewatching_a_level_replaces_its_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");
        fs::write(&first, "{}").expect("write a");
        fs::write(&second, "{}").expect("write b");
        let mut watcher = LevelHotReload::new().expect("watcher");
        watcher.watch("ward", &first).expect("watch a");
        watcher.watch("ward", &second).expect("watch b");
        assert_eq!(watcher.watched_levels(), vec!["ward".to_string()]);
        assert_eq!(watcher.watched.len(), 1);
    }
}

use std::fmt;

use crate::dialogue::DialogueEvent;
use crate::level::document::EntityKind;

/// Notifications a level raises for its owner, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelEvent {
    Loaded { level: String, spawned: usize, failed: usize },
    EntitySpawnFailed { index: usize, kind: EntityKind, reason: String },
    NpcInteraction { index: usize, name: String },
    TriggerFired { id: String },
    TransitionRequested { target: String },
    /// Forwarded from the shared dialogue engine so hosts have a single queue to read.
    Dialogue(DialogueEvent),
    HotUpdated { level: String, music_changed: bool },
}

impl fmt::Display for LevelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelEvent::Loaded { level, spawned, failed } => {
                write!(f, "Loaded level={level} spawned={spawned} failed={failed}")
            }
            LevelEvent::EntitySpawnFailed { index, kind, reason } => {
                write!(f, "EntitySpawnFailed index={index} kind={} reason={reason}", kind.label())
            }
            LevelEvent::NpcInteraction { index, name } => write!(f, "NpcInteraction index={index} name={name}"),
            LevelEvent::TriggerFired { id } => write!(f, "TriggerFired id={id}"),
            LevelEvent::TransitionRequested { target } => write!(f, "TransitionRequested target={target}"),
            LevelEvent::Dialogue(event) => write!(f, "Dialogue {event:?}"),
            LevelEvent::HotUpdated { level, music_changed } => {
                write!(f, "HotUpdated level={level} music_changed={music_changed}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<LevelEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: LevelEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<LevelEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

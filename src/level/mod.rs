pub mod document;
mod editor;
mod effects;
mod live_edit;
mod registry;
mod runtime;
mod triggers;

pub use document::{EntityKind, EntitySpawn, LevelDocument};
pub use editor::{EditorCallbacks, Selection};
pub use effects::{heartbeat_wave, EffectStack};
pub use registry::{EntityMeta, EntityRegistry, LiveEntity};
pub use runtime::{Level, LoadSummary, PlayerState};
pub use triggers::{TriggerBook, TriggerState};

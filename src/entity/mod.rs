mod factory;
mod npc;
mod portal;
mod prop;

pub use factory::{EntityFactory, SpawnError};
pub(crate) use factory::load_bundle;
pub use npc::{Npc, NpcOptions};
pub use portal::{Portal, PortalMotion};
pub use prop::Prop;

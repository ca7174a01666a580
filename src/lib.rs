pub mod audio;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dialogue;
pub mod entity;
pub mod events;
pub mod gizmo;
pub mod headless;
pub mod level;
pub mod manager;
pub mod scene;
pub mod services;
pub mod time;
pub mod watch;

pub use level::{Level, LevelDocument};
pub use manager::LevelManager;
pub use services::{LoadCancel, Services};

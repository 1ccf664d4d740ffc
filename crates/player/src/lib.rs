//! Playback engine for one scene: a single active video handle driven across
//! the shot timeline, audio tracks kept inside a drift tolerance band of the
//! shared scene clock. The scene clock is always derived from the active
//! video handle; nothing else originates time.

mod config;
pub use config::*;
mod media;
pub use media::*;
mod events;
pub use events::*;
mod controller;
pub use controller::*;
mod audio_sync;
pub use audio_sync::*;
mod scene_player;
pub use scene_player::*;
pub mod sim;

//! Pitch-tracking four-lane rhythm game.
//!
//! A decoded track is sampled once per rendered frame; the dominant pitch of
//! either the vocal band or the full mix feeds a tile engine that spawns,
//! merges and scores falling tiles.

pub mod audio;
pub mod config;
pub mod game;
pub mod graphics;
pub mod history;
pub mod pitch;
pub mod session;
pub mod tempo;
pub mod ui;
pub mod worker;

/// Logger setup shared by every binary.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

//! Core library for hearing-sync: playback-state synchronization for a remote playlist player.
pub mod config;
pub mod error;
pub mod models;
pub mod util;
pub mod db;
pub mod api;
pub mod catalog;
pub mod resume;
pub mod status;
pub mod recorder;
pub mod player;
pub mod session;
pub mod coordinator;

pub use coordinator::SyncCoordinator;
pub use error::{Result, SyncError};

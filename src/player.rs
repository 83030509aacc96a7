use crate::error::Result;
use crate::models::PlayableItem;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

/// Signals emitted by the media-playback capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackSignal {
    /// Metadata for the current item is available.
    Loaded { duration_seconds: f64 },
    PositionChanged { position_seconds: f64 },
    Started,
    Paused,
    /// Natural end of the current item.
    TrackEnded,
}

/// Native media playback. Decoding and output live behind this trait; the engine
/// only points it at items, seeks, and starts/stops it.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Point the player at `item` without starting playback.
    async fn load(&self, item: &PlayableItem) -> Result<()>;
    fn seek(&self, position_seconds: f64);
    fn play(&self);
    fn pause(&self);
    fn is_paused(&self) -> bool;
}

#[derive(Debug, Default)]
struct HeadlessState {
    loaded: Option<String>,
    position: f64,
    paused: bool,
}

/// Player without audio output, used by the CLI to show where playback would resume.
pub struct HeadlessPlayer {
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessPlayer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState { paused: true, ..Default::default() }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn loaded_locator(&self) -> Option<String> {
        self.lock().loaded.clone()
    }

    pub fn position(&self) -> f64 {
        self.lock().position
    }
}

#[async_trait]
impl MediaPlayer for HeadlessPlayer {
    async fn load(&self, item: &PlayableItem) -> Result<()> {
        info!("HeadlessPlayer: load {}", item.label());
        let mut st = self.lock();
        st.loaded = Some(item.source_locator.clone());
        st.position = 0.0;
        Ok(())
    }

    fn seek(&self, position_seconds: f64) {
        self.lock().position = position_seconds;
    }

    fn play(&self) {
        self.lock().paused = false;
    }

    fn pause(&self) {
        self.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }
}

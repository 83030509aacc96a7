use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::models::{PlayableItem, PlaybackAction};
use crate::player::{MediaPlayer, PlaybackSignal};
use crate::recorder::PlaybackStateRecorder;
use crate::resume::ResumePoint;
use crate::status::StatusBoard;

/// Everything one initialized player owns: the catalog, the playback cursor and
/// the recorder that persists history. Produced by `SyncCoordinator::initialize`.
pub struct PlayerSession {
    id: Uuid,
    catalog: Catalog,
    resume: ResumePoint,
    current_index: usize,
    position: f64,
    duration: f64,
    is_playing: bool,
    skip_seconds: f64,
    player: Arc<dyn MediaPlayer>,
    recorder: PlaybackStateRecorder,
    recorder_task: JoinHandle<()>,
    status: StatusBoard,
}

impl PlayerSession {
    pub(crate) fn new(
        catalog: Catalog,
        resume: ResumePoint,
        player: Arc<dyn MediaPlayer>,
        recorder: (PlaybackStateRecorder, JoinHandle<()>),
        status: StatusBoard,
        skip_seconds: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            catalog,
            resume,
            current_index: 0,
            position: 0.0,
            duration: 0.0,
            is_playing: false,
            skip_seconds,
            player,
            recorder: recorder.0,
            recorder_task: recorder.1,
            status,
        }
    }

    /// Load the resume item and seek to its offset. Playback is not started.
    pub(crate) async fn prime(&mut self) {
        let Some((index, offset)) = self.resume.position() else {
            info!("No audio files found; playback disabled");
            return;
        };
        self.current_index = index;
        self.load_current().await;
        if offset > 0.0 {
            self.seek_to(offset);
        }
        debug!("session {} primed at item {} offset {:.1}s", self.id, index, offset);
    }

    async fn load_current(&mut self) {
        self.position = 0.0;
        self.duration = 0.0;
        let Some(item) = self.catalog.get(self.current_index) else {
            return;
        };
        if let Err(e) = self.player.load(item).await {
            warn!("Error loading {}: {}", item.label(), e);
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resume_point(&self) -> ResumePoint {
        self.resume
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_item(&self) -> Option<&PlayableItem> {
        self.catalog.get(self.current_index)
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn recorder(&self) -> &PlaybackStateRecorder {
        &self.recorder
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    fn record(&self, action: PlaybackAction, offset: f64) {
        if let Some(item) = self.current_item() {
            self.recorder.on_event(action, item, offset);
        }
    }

    /// Apply one signal from the media player. Recording never waits on persistence.
    pub async fn handle_signal(&mut self, signal: PlaybackSignal) {
        if self.catalog.is_empty() {
            return;
        }
        match signal {
            PlaybackSignal::Loaded { duration_seconds } => {
                self.duration = duration_seconds;
            }
            PlaybackSignal::PositionChanged { position_seconds } => {
                self.position = position_seconds;
            }
            PlaybackSignal::Started => {
                self.is_playing = true;
                self.record(PlaybackAction::Start, self.position);
            }
            PlaybackSignal::Paused => {
                self.is_playing = false;
                self.record(PlaybackAction::Stop, self.position);
            }
            PlaybackSignal::TrackEnded => {
                // Completion is recorded at the full duration, not the last reported position.
                if self.duration > 0.0 {
                    self.position = self.duration;
                }
                if let Some(item) = self.current_item() {
                    info!("Track finished: {}", item.label());
                }
                self.record(PlaybackAction::Stop, self.position);
                self.next_track().await;
            }
        }
    }

    /// Consume signals until the sender side closes.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<PlaybackSignal>) {
        while let Some(sig) = signals.recv().await {
            self.handle_signal(sig).await;
        }
    }

    async fn next_track(&mut self) {
        if self.current_index + 1 >= self.catalog.len() {
            self.is_playing = false;
            info!("Playlist finished: all {} items completed", self.catalog.len());
            return;
        }
        let from = self.current_item().and_then(|i| i.group_name.clone());
        self.current_index += 1;
        let to = self.current_item().and_then(|i| i.group_name.clone());
        if let (Some(f), Some(t)) = (&from, &to) {
            if f != t {
                info!("Moving from folder {:?} to {:?}", f, t);
            }
        }
        self.load_current().await;
        if self.is_playing {
            self.player.play();
        }
    }

    pub fn toggle_play_pause(&self) {
        if self.catalog.is_empty() {
            return;
        }
        if self.player.is_paused() {
            self.player.play();
        } else {
            self.player.pause();
        }
    }

    pub fn seek_to(&mut self, position_seconds: f64) {
        self.player.seek(position_seconds);
        self.position = position_seconds;
    }

    pub fn skip_backward(&mut self) {
        let target = (self.position - self.skip_seconds).max(0.0);
        self.seek_to(target);
        debug!("Skipped backward to {:.1}s", target);
    }

    pub fn skip_forward(&mut self) {
        let target = (self.position + self.skip_seconds).min(self.duration);
        self.seek_to(target);
        debug!("Skipped forward to {:.1}s", target);
    }

    /// Wait for pending writes to settle, then stop the recorder.
    pub async fn shutdown(self) {
        self.recorder.flush().await;
        drop(self.recorder);
        if let Err(e) = self.recorder_task.await {
            warn!("recorder task ended abnormally: {}", e);
        }
    }
}

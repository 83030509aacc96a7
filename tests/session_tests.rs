use async_trait::async_trait;
use hearing_sync::api::mock::{InMemoryDocumentStore, StaticCatalogSource};
use hearing_sync::coordinator::{Backends, CoordinatorSettings, SyncCoordinator};
use hearing_sync::models::{Credentials, PlayableItem, PlaybackAction, SharedStateDocument};
use hearing_sync::player::{MediaPlayer, PlaybackSignal};
use hearing_sync::session::PlayerSession;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Records every call the session makes on the player.
struct TestPlayer {
    calls: Mutex<Vec<String>>,
    paused: Mutex<bool>,
}

impl TestPlayer {
    fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()), paused: Mutex::new(true) }
    }
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaPlayer for TestPlayer {
    async fn load(&self, item: &PlayableItem) -> hearing_sync::Result<()> {
        self.calls.lock().unwrap().push(format!("load:{}", item.id));
        Ok(())
    }
    fn seek(&self, position_seconds: f64) {
        self.calls.lock().unwrap().push(format!("seek:{}", position_seconds));
    }
    fn play(&self) {
        *self.paused.lock().unwrap() = false;
        self.calls.lock().unwrap().push("play".into());
    }
    fn pause(&self) {
        *self.paused.lock().unwrap() = true;
        self.calls.lock().unwrap().push("pause".into());
    }
    fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap()
    }
}

fn two_folder_source() -> Arc<StaticCatalogSource> {
    Arc::new(
        StaticCatalogSource::new()
            .with_folder("root", "g1", "Book 1")
            .with_folder("root", "g2", "Book 2")
            .with_file("g1", "a", "01.mp3", "audio/mpeg")
            .with_file("g2", "b", "01.mp3", "audio/mpeg"),
    )
}

async fn start(
    store: Arc<InMemoryDocumentStore>,
    source: Arc<StaticCatalogSource>,
    player: Arc<TestPlayer>,
) -> PlayerSession {
    let connector = move |_c: &Credentials| -> hearing_sync::Result<Backends> {
        Ok(Backends { store: store.clone(), catalog: source.clone() })
    };
    let coordinator = SyncCoordinator::new(Arc::new(connector), CoordinatorSettings::default());
    coordinator
        .initialize(&Credentials::new("drive", "repo", "root"), player)
        .await
        .expect("initialize")
}

#[tokio::test]
async fn track_end_is_recorded_at_full_duration_and_advances() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let player = Arc::new(TestPlayer::new());
    let mut session = start(store.clone(), two_folder_source(), player.clone()).await;

    session.handle_signal(PlaybackSignal::Loaded { duration_seconds: 120.0 }).await;
    session.handle_signal(PlaybackSignal::Started).await;
    session.handle_signal(PlaybackSignal::PositionChanged { position_seconds: 119.4 }).await;
    session.handle_signal(PlaybackSignal::TrackEnded).await;
    session.recorder().flush().await;

    let doc = store.stored_document().unwrap();
    assert_eq!(doc.history.len(), 2);
    assert_eq!(doc.history[1].action, PlaybackAction::Stop);
    assert_eq!(doc.history[1].offset_seconds, 120.0);
    assert_eq!(doc.history[1].file_label, "Book 1 / 01.mp3");

    assert_eq!(session.current_index(), 1);
    assert_eq!(session.position(), 0.0);
    assert_eq!(player.calls(), vec!["load:a", "load:b", "play"]);
}

#[tokio::test]
async fn last_track_end_stops_playback() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let source = Arc::new(StaticCatalogSource::new().with_file("root", "x", "x.mp3", "audio/mpeg"));
    let player = Arc::new(TestPlayer::new());
    let connector = move |_c: &Credentials| -> hearing_sync::Result<Backends> {
        Ok(Backends { store: store.clone(), catalog: source.clone() })
    };
    let settings = CoordinatorSettings {
        layout: hearing_sync::config::CatalogLayout::Flat,
        ..CoordinatorSettings::default()
    };
    let coordinator = SyncCoordinator::new(Arc::new(connector), settings);
    let mut session = coordinator
        .initialize(&Credentials::new("drive", "repo", "root"), player.clone())
        .await
        .unwrap();

    session.handle_signal(PlaybackSignal::Started).await;
    assert!(session.is_playing());
    session.handle_signal(PlaybackSignal::TrackEnded).await;
    assert!(!session.is_playing());
    assert_eq!(session.current_index(), 0);
    assert_eq!(player.calls(), vec!["load:x"]);
}

#[tokio::test]
async fn resume_primes_player_without_starting_it() {
    let mut doc = SharedStateDocument::default();
    doc.current_file_label = "Book 2/01.mp3".into();
    doc.current_offset_seconds = 42.0;
    let store = Arc::new(InMemoryDocumentStore::with_document(&doc).unwrap());
    let player = Arc::new(TestPlayer::new());
    let session = start(store.clone(), two_folder_source(), player.clone()).await;

    assert_eq!(session.current_index(), 1);
    assert_eq!(session.position(), 42.0);
    assert!(!session.is_playing());
    assert_eq!(player.calls(), vec!["load:b", "seek:42"]);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn pause_records_stop_at_current_position() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let player = Arc::new(TestPlayer::new());
    let mut session = start(store.clone(), two_folder_source(), player).await;

    session.handle_signal(PlaybackSignal::Loaded { duration_seconds: 300.0 }).await;
    session.handle_signal(PlaybackSignal::Started).await;
    session.handle_signal(PlaybackSignal::PositionChanged { position_seconds: 75.5 }).await;
    session.handle_signal(PlaybackSignal::Paused).await;
    session.recorder().flush().await;

    let doc = store.stored_document().unwrap();
    assert_eq!(doc.current_offset_seconds, 75.5);
    assert_eq!(doc.history.last().unwrap().action, PlaybackAction::Stop);
    assert!(!session.is_playing());
}

#[tokio::test]
async fn track_change_does_not_wait_for_persistence() {
    let store = Arc::new(InMemoryDocumentStore::new().with_write_delay(Duration::from_millis(400)));
    let player = Arc::new(TestPlayer::new());
    let mut session = start(store.clone(), two_folder_source(), player.clone()).await;

    let began = tokio::time::Instant::now();
    session.handle_signal(PlaybackSignal::Loaded { duration_seconds: 10.0 }).await;
    session.handle_signal(PlaybackSignal::Started).await;
    session.handle_signal(PlaybackSignal::TrackEnded).await;
    assert!(began.elapsed() < Duration::from_millis(200));
    assert_eq!(session.current_index(), 1);
    assert!(store.writes().is_empty());

    session.recorder().flush().await;
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].expected, writes[0].accepted);
}

#[tokio::test]
async fn skips_are_clamped_and_not_recorded() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let player = Arc::new(TestPlayer::new());
    let mut session = start(store.clone(), two_folder_source(), player.clone()).await;

    session.handle_signal(PlaybackSignal::PositionChanged { position_seconds: 3.0 }).await;
    session.skip_backward();
    assert_eq!(session.position(), 0.0);

    session.handle_signal(PlaybackSignal::Loaded { duration_seconds: 100.0 }).await;
    session.seek_to(98.0);
    session.skip_forward();
    assert_eq!(session.position(), 100.0);

    session.recorder().flush().await;
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn toggle_asks_player_to_play_then_pause() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let player = Arc::new(TestPlayer::new());
    let session = start(store, two_folder_source(), player.clone()).await;

    session.toggle_play_pause();
    session.toggle_play_pause();
    assert_eq!(player.calls(), vec!["load:a", "play", "pause"]);
}

#[tokio::test]
async fn run_consumes_signals_until_sender_closes() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let player = Arc::new(TestPlayer::new());
    let mut session = start(store.clone(), two_folder_source(), player).await;

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    tx.send(PlaybackSignal::Started).await.unwrap();
    tx.send(PlaybackSignal::PositionChanged { position_seconds: 9.0 }).await.unwrap();
    tx.send(PlaybackSignal::Paused).await.unwrap();
    drop(tx);
    session.run(rx).await;
    session.shutdown().await;

    let doc = store.stored_document().unwrap();
    assert_eq!(doc.history.len(), 2);
    assert_eq!(doc.current_offset_seconds, 9.0);
}

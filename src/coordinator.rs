use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::drive::DriveCatalogSource;
use crate::api::github::GithubDocumentStore;
use crate::api::{CatalogSource, DocumentStore, RemoteEntry};
use crate::catalog::{self, Catalog};
use crate::config::{default_audio_mime_types, CatalogLayout, Config};
use crate::error::{Result, SyncError};
use crate::models::{Credentials, Revision, SharedStateDocument};
use crate::player::MediaPlayer;
use crate::recorder::PlaybackStateRecorder;
use crate::resume;
use crate::session::PlayerSession;
use crate::status::{ConnectionStatus, Service, StatusBoard};
use crate::util::bounded;

/// The two remote collaborators bound to a set of credentials.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub catalog: Arc<dyn CatalogSource>,
}

/// Builds backends from credentials. Closures of the same shape implement it too.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Backends>;
}

impl<F> BackendConnector for F
where
    F: Fn(&Credentials) -> Result<Backends> + Send + Sync,
{
    fn connect(&self, credentials: &Credentials) -> Result<Backends> {
        self(credentials)
    }
}

/// Stand-in for backends that could not be built; every call is a transport error.
struct Unavailable {
    reason: String,
}

impl Unavailable {
    fn fail<T>(&self) -> Result<T> {
        Err(SyncError::Transport(format!("backend unavailable: {}", self.reason)))
    }
}

#[async_trait]
impl DocumentStore for Unavailable {
    async fn read(&self) -> Result<(SharedStateDocument, Revision)> {
        self.fail()
    }

    async fn write(&self, _: &SharedStateDocument, _: Option<&Revision>, _: &str) -> Result<Revision> {
        self.fail()
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[async_trait]
impl CatalogSource for Unavailable {
    async fn list_folders(&self, _: &str) -> Result<Vec<RemoteEntry>> {
        self.fail()
    }

    async fn list_audio(&self, _: &str, _: &[String]) -> Result<Vec<RemoteEntry>> {
        self.fail()
    }

    fn source_locator(&self, _: &str) -> String {
        String::new()
    }

    async fn fetch_media(&self, _: &str) -> Result<Vec<u8>> {
        self.fail()
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// GitHub contents API for the document, Google Drive for the catalog.
pub struct HttpConnector {
    config: Config,
}

impl HttpConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl BackendConnector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Backends> {
        let store = GithubDocumentStore::from_config(&self.config, &credentials.repo_token)?;
        let catalog = DriveCatalogSource::from_config(&self.config, &credentials.drive_token)?;
        Ok(Backends {
            store: Arc::new(store),
            catalog: Arc::new(catalog),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub layout: CatalogLayout,
    pub audio_mime_types: Vec<String>,
    pub request_timeout: Duration,
    pub skip_seconds: f64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            layout: CatalogLayout::Grouped,
            audio_mime_types: default_audio_mime_types(),
            request_timeout: Duration::from_secs(15),
            skip_seconds: 5.0,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            layout: cfg.catalog_layout,
            audio_mime_types: cfg.audio_mime_types.clone(),
            request_timeout: cfg.request_timeout(),
            skip_seconds: cfg.skip_seconds,
        }
    }
}

/// Reachability of each backend, as reported by `SyncCoordinator::probe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub document_store: bool,
    pub catalog: bool,
}

/// Joins the document and the catalog into a ready-to-play session.
pub struct SyncCoordinator {
    connector: Arc<dyn BackendConnector>,
    settings: CoordinatorSettings,
    status: StatusBoard,
}

impl SyncCoordinator {
    pub fn new(connector: Arc<dyn BackendConnector>, settings: CoordinatorSettings) -> Self {
        Self {
            connector,
            settings,
            status: StatusBoard::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            Arc::new(HttpConnector::new(cfg.clone())),
            CoordinatorSettings::from_config(cfg),
        )
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    fn require(&self, credentials: &Credentials) -> Result<()> {
        let missing = credentials.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        warn!("Missing credentials ({}); configure them before connecting", missing.join(", "));
        Err(SyncError::MissingCredentials(missing.join(", ")))
    }

    /// Backends for `credentials`; when they cannot be built, stand-ins that fail
    /// every call so the caller degrades to disconnected instead of aborting.
    fn backends_for(&self, credentials: &Credentials) -> Backends {
        match self.connector.connect(credentials) {
            Ok(backends) => backends,
            Err(e) => {
                warn!("Could not set up remote backends: {}", e);
                let unavailable = Arc::new(Unavailable { reason: e.to_string() });
                Backends {
                    store: unavailable.clone(),
                    catalog: unavailable,
                }
            }
        }
    }

    /// Load the document, then the catalog, resolve the resume point and prime
    /// `player` there without starting playback. Only missing credentials abort.
    pub async fn initialize(
        &self,
        credentials: &Credentials,
        player: Arc<dyn MediaPlayer>,
    ) -> Result<PlayerSession> {
        if let Err(e) = self.require(credentials) {
            self.status.set(Service::DocumentStore, ConnectionStatus::Disconnected);
            self.status.set(Service::Catalog, ConnectionStatus::Disconnected);
            return Err(e);
        }
        let backends = self.backends_for(credentials);

        let (document, revision) = self.load_document(backends.store.as_ref()).await;
        let catalog = self.load_catalog(backends.catalog.as_ref(), &credentials.folder_id).await;

        let resume = resume::resolve(&document, &catalog);
        info!("Resume point: {:?}", resume);

        let recorder = PlaybackStateRecorder::spawn(
            backends.store.clone(),
            document,
            revision,
            self.status.clone(),
            self.settings.request_timeout,
        );
        let mut session = PlayerSession::new(
            catalog,
            resume,
            player,
            recorder,
            self.status.clone(),
            self.settings.skip_seconds,
        );
        session.prime().await;
        Ok(session)
    }

    async fn load_document(&self, store: &dyn DocumentStore) -> (SharedStateDocument, Option<Revision>) {
        self.status.set(Service::DocumentStore, ConnectionStatus::Connecting);
        let limit = self.settings.request_timeout;
        match bounded(limit, "document read", store.read()).await {
            Ok((doc, rev)) => {
                self.status.set(Service::DocumentStore, ConnectionStatus::Connected);
                self.status.mark_synced(Utc::now());
                info!("Loaded playback state: {} history events", doc.history.len());
                (doc, Some(rev))
            }
            Err(SyncError::NotFound) => {
                info!("No shared document on {} yet; starting with an empty one", store.name());
                self.status.set(Service::DocumentStore, ConnectionStatus::Connected);
                (SharedStateDocument::default(), None)
            }
            Err(SyncError::Decoding(msg)) => {
                warn!("Shared document is malformed ({}); starting with an empty one", msg);
                self.status.set(Service::DocumentStore, ConnectionStatus::Disconnected);
                // Keep the revision so the first write replaces the bad copy without a conflict.
                let rev = bounded(limit, "revision read", store.current_revision())
                    .await
                    .unwrap_or(None);
                (SharedStateDocument::default(), rev)
            }
            Err(e) => {
                warn!("Failed to load playback state: {}", e);
                self.status.set(Service::DocumentStore, ConnectionStatus::Disconnected);
                (SharedStateDocument::default(), None)
            }
        }
    }

    async fn load_catalog(&self, source: &dyn CatalogSource, root_id: &str) -> Catalog {
        self.status.set(Service::Catalog, ConnectionStatus::Connecting);
        let loaded = catalog::load(
            source,
            root_id,
            self.settings.layout,
            &self.settings.audio_mime_types,
            self.settings.request_timeout,
        )
        .await;
        match loaded {
            Ok(cat) => {
                self.status.set(Service::Catalog, ConnectionStatus::Connected);
                cat
            }
            Err(e) => {
                warn!("Failed to load audio files: {}", e);
                self.status.set(Service::Catalog, ConnectionStatus::Disconnected);
                Catalog::empty()
            }
        }
    }

    /// Check that both backends answer with these credentials. Does not touch the status board.
    pub async fn probe(&self, credentials: &Credentials) -> Result<ProbeReport> {
        self.require(credentials)?;
        let backends = self.backends_for(credentials);
        let limit = self.settings.request_timeout;

        let document_store = match bounded(limit, "document probe", backends.store.current_revision()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("{} connection test failed: {}", backends.store.name(), e);
                false
            }
        };
        let root = credentials.folder_id.as_str();
        let listing = match self.settings.layout {
            CatalogLayout::Grouped => bounded(limit, "catalog probe", backends.catalog.list_folders(root)).await,
            CatalogLayout::Flat => {
                bounded(
                    limit,
                    "catalog probe",
                    backends.catalog.list_audio(root, &self.settings.audio_mime_types),
                )
                .await
            }
        };
        let catalog = match listing {
            Ok(_) => true,
            Err(e) => {
                warn!("{} connection test failed: {}", backends.catalog.name(), e);
                false
            }
        };
        Ok(ProbeReport { document_store, catalog })
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    DocumentStore,
    Catalog,
}

struct Channels {
    document: watch::Sender<ConnectionStatus>,
    catalog: watch::Sender<ConnectionStatus>,
    last_synced: watch::Sender<Option<DateTime<Utc>>>,
}

/// Latest connection outcome per backing service plus the last successful sync time.
/// Cheap to clone; observers subscribe to `watch` receivers.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<Channels>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (document, _) = watch::channel(ConnectionStatus::Disconnected);
        let (catalog, _) = watch::channel(ConnectionStatus::Disconnected);
        let (last_synced, _) = watch::channel(None);
        Self {
            inner: Arc::new(Channels { document, catalog, last_synced }),
        }
    }

    fn sender(&self, service: Service) -> &watch::Sender<ConnectionStatus> {
        match service {
            Service::DocumentStore => &self.inner.document,
            Service::Catalog => &self.inner.catalog,
        }
    }

    pub fn set(&self, service: Service, status: ConnectionStatus) {
        let prev = self.sender(service).send_replace(status);
        if prev != status {
            debug!("{:?} status {} -> {}", service, prev, status);
        }
    }

    pub fn get(&self, service: Service) -> ConnectionStatus {
        *self.sender(service).borrow()
    }

    pub fn subscribe(&self, service: Service) -> watch::Receiver<ConnectionStatus> {
        self.sender(service).subscribe()
    }

    pub fn mark_synced(&self, at: DateTime<Utc>) {
        self.inner.last_synced.send_replace(Some(at));
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_synced.borrow()
    }

    pub fn subscribe_last_synced(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_synced.subscribe()
    }
}

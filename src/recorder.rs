//! Folds start/stop signals into the shared document and persists it.
//!
//! A single background task owns the document and its revision. Commands are
//! handled strictly in arrival order and a write is fully settled before the
//! next event is applied, so at most one write is ever outstanding.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::DocumentStore;
use crate::error::{Result, SyncError};
use crate::models::{PlayableItem, PlaybackAction, PlaybackEvent, Revision, SharedStateDocument};
use crate::status::{ConnectionStatus, Service, StatusBoard};
use crate::util::bounded;

#[derive(Debug)]
struct RecordRequest {
    action: PlaybackAction,
    file_label: String,
    offset_seconds: f64,
}

enum Command {
    Record(RecordRequest),
    Flush(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<(SharedStateDocument, Option<Revision>)>),
}

/// Handle used by the session to report playback events. Cloning shares the same worker.
#[derive(Clone)]
pub struct PlaybackStateRecorder {
    tx: mpsc::UnboundedSender<Command>,
}

impl PlaybackStateRecorder {
    /// Start the worker with the document and revision obtained at initialization.
    /// The worker stops once every handle is dropped.
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        document: SharedStateDocument,
        revision: Option<Revision>,
        status: StatusBoard,
        timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = RecorderWorker {
            store,
            document,
            revision,
            status,
            timeout,
            last_stamp: None,
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { tx }, handle)
    }

    /// Record `action` for `item` at `offset_seconds`. Never waits for persistence.
    pub fn on_event(&self, action: PlaybackAction, item: &PlayableItem, offset_seconds: f64) {
        let req = RecordRequest {
            action,
            file_label: item.label(),
            offset_seconds,
        };
        if self.tx.send(Command::Record(req)).is_err() {
            warn!("recorder worker has stopped; dropping {} event for {}", action, item.label());
        }
    }

    /// Wait until every event sent so far has been applied and its write settled.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Local copy of the document and the held revision, after pending events settle.
    pub async fn snapshot(&self) -> Option<(SharedStateDocument, Option<Revision>)> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Command::Snapshot(tx)).ok()?;
        rx.await.ok()
    }
}

struct RecorderWorker {
    store: Arc<dyn DocumentStore>,
    document: SharedStateDocument,
    revision: Option<Revision>,
    status: StatusBoard,
    timeout: Duration,
    last_stamp: Option<DateTime<Utc>>,
}

impl RecorderWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Record(req) => self.record(req).await,
                Command::Flush(done) => {
                    let _ = done.send(());
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send((self.document.clone(), self.revision.clone()));
                }
            }
        }
        debug!("recorder worker stopped with {} history events", self.document.history.len());
    }

    async fn record(&mut self, req: RecordRequest) {
        let event = self.append(req);
        info!("Recorded {} {} at {:.1}s", event.action, event.file_label, event.offset_seconds);

        match self.persist().await {
            Ok(rev) => {
                debug!("document saved at revision {}", rev);
                self.status.set(Service::DocumentStore, ConnectionStatus::Connected);
                self.status.mark_synced(Utc::now());
            }
            Err(e) => {
                // The event stays in local history and rides along with the next successful write.
                warn!("Failed to save playback state: {}", e);
                self.status.set(Service::DocumentStore, ConnectionStatus::Disconnected);
            }
        }
    }

    fn append(&mut self, req: RecordRequest) -> PlaybackEvent {
        let mut now = Utc::now();
        if let Some(prev) = self.last_stamp {
            if now < prev {
                now = prev;
            }
        }
        self.last_stamp = Some(now);

        let offset_seconds = if req.offset_seconds.is_finite() && req.offset_seconds > 0.0 {
            req.offset_seconds
        } else {
            0.0
        };
        let event = PlaybackEvent {
            action: req.action,
            file_label: req.file_label,
            offset_seconds,
            occurred_at: now,
        };
        self.document.apply(event.clone());
        event
    }

    /// One write; on a stale revision, re-read the revision and retry exactly once.
    async fn persist(&mut self) -> Result<Revision> {
        let message = format!(
            "Update playback state - {}",
            self.document.last_updated.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        match self.write_once(&message).await {
            Err(SyncError::RevisionConflict) => {
                warn!(
                    "Revision {} is stale; re-reading {} and retrying once",
                    self.revision.as_ref().map(|r| r.as_str()).unwrap_or("<none>"),
                    self.store.name()
                );
                self.revision = bounded(self.timeout, "revision re-read", self.store.current_revision()).await?;
                self.write_once(&message).await
            }
            other => other,
        }
    }

    async fn write_once(&mut self, message: &str) -> Result<Revision> {
        let rev = bounded(
            self.timeout,
            "document write",
            self.store.write(&self.document, self.revision.as_ref(), message),
        )
        .await?;
        self.revision = Some(rev.clone());
        Ok(rev)
    }
}

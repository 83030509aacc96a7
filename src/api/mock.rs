use super::{CatalogSource, DocumentStore, RemoteEntry};
use crate::error::{Result, SyncError};
use crate::models::{Revision, SharedStateDocument};
use crate::util;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// One write attempt as seen by the in-memory store.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub expected: Option<Revision>,
    pub document: SharedStateDocument,
    pub message: String,
    /// New revision on success, `None` when the write was rejected.
    pub accepted: Option<Revision>,
}

#[derive(Default)]
struct StoreState {
    content: Option<String>,
    revision: Option<Revision>,
    seq: u64,
    reads: usize,
    writes: Vec<WriteRecord>,
    pending_conflicts: usize,
    pending_write_failures: usize,
    fail_reads: bool,
    in_flight: usize,
    max_in_flight: usize,
}

impl StoreState {
    fn bump(&mut self, content: String) -> Revision {
        self.seq += 1;
        let hash = Sha256::digest(format!("{}:{}", self.seq, content).as_bytes());
        let rev = Revision::new(format!("{:x}", hash));
        self.content = Some(content);
        self.revision = Some(rev.clone());
        rev
    }
}

/// Revision-checked document store kept in memory. Content is held base64-encoded
/// like a content API would, and failures can be injected for tests and offline runs.
pub struct InMemoryDocumentStore {
    state: Mutex<StoreState>,
    write_delay: Duration,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            write_delay: Duration::ZERO,
        }
    }

    pub fn with_document(doc: &SharedStateDocument) -> Result<Self> {
        let store = Self::new();
        store.replace_remote(doc)?;
        Ok(store)
    }

    /// Store content that is not a valid document.
    pub fn with_raw_content(encoded: &str) -> Self {
        let store = Self::new();
        store.lock().bump(encoded.to_string());
        store
    }

    /// Every write sleeps this long before it is applied.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Simulate another device writing the document; changes the revision.
    pub fn replace_remote(&self, doc: &SharedStateDocument) -> Result<Revision> {
        let encoded = util::encode_document(doc)?;
        Ok(self.lock().bump(encoded))
    }

    /// The next `n` writes are rejected as stale regardless of the revision supplied.
    pub fn inject_conflicts(&self, n: usize) {
        self.lock().pending_conflicts = n;
    }

    /// The next `n` writes fail with a transport error.
    pub fn inject_write_failures(&self, n: usize) {
        self.lock().pending_write_failures = n;
    }

    pub fn set_read_failure(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn max_in_flight_writes(&self) -> usize {
        self.lock().max_in_flight
    }

    pub fn revision(&self) -> Option<Revision> {
        self.lock().revision.clone()
    }

    pub fn stored_document(&self) -> Option<SharedStateDocument> {
        let content = self.lock().content.clone()?;
        util::decode_document(&content).ok()
    }

    fn settle_write(
        &self,
        document: &SharedStateDocument,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision> {
        let mut st = self.lock();
        st.in_flight -= 1;
        let mut record = WriteRecord {
            expected: expected.cloned(),
            document: document.clone(),
            message: message.to_string(),
            accepted: None,
        };
        let outcome = if st.pending_write_failures > 0 {
            st.pending_write_failures -= 1;
            Err(SyncError::Transport("injected write failure".into()))
        } else if st.pending_conflicts > 0 {
            st.pending_conflicts -= 1;
            Err(SyncError::RevisionConflict)
        } else if st.revision.as_ref() != expected {
            Err(SyncError::RevisionConflict)
        } else {
            match util::encode_document(document) {
                Ok(encoded) => Ok(st.bump(encoded)),
                Err(e) => Err(e),
            }
        };
        if let Ok(rev) = &outcome {
            record.accepted = Some(rev.clone());
        }
        st.writes.push(record);
        outcome
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self) -> Result<(SharedStateDocument, Revision)> {
        let (content, revision) = {
            let mut st = self.lock();
            st.reads += 1;
            if st.fail_reads {
                return Err(SyncError::Transport("injected read failure".into()));
            }
            match (st.content.clone(), st.revision.clone()) {
                (Some(c), Some(r)) => (c, r),
                _ => return Err(SyncError::NotFound),
            }
        };
        Ok((util::decode_document(&content)?, revision))
    }

    async fn current_revision(&self) -> Result<Option<Revision>> {
        let mut st = self.lock();
        st.reads += 1;
        if st.fail_reads {
            return Err(SyncError::Transport("injected read failure".into()));
        }
        Ok(st.revision.clone())
    }

    async fn write(
        &self,
        document: &SharedStateDocument,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision> {
        {
            let mut st = self.lock();
            st.in_flight += 1;
            st.max_in_flight = st.max_in_flight.max(st.in_flight);
        }
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        self.settle_write(document, expected, message)
    }
}

/// Fixed folder tree served from memory, in insertion order.
#[derive(Default)]
pub struct StaticCatalogSource {
    folders: HashMap<String, Vec<RemoteEntry>>,
    files: HashMap<String, Vec<RemoteEntry>>,
    failing: HashSet<String>,
    media: HashMap<String, Vec<u8>>,
}

impl StaticCatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, parent_id: &str, id: &str, name: &str) -> Self {
        self.folders.entry(parent_id.to_string()).or_default().push(RemoteEntry {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some("application/vnd.google-apps.folder".to_string()),
        });
        self
    }

    pub fn with_file(mut self, parent_id: &str, id: &str, name: &str, mime_type: &str) -> Self {
        self.files.entry(parent_id.to_string()).or_default().push(RemoteEntry {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some(mime_type.to_string()),
        });
        self
    }

    pub fn with_media(mut self, item_id: &str, bytes: &[u8]) -> Self {
        self.media.insert(item_id.to_string(), bytes.to_vec());
        self
    }

    /// Listing `parent_id` fails with a transport error.
    pub fn failing(mut self, parent_id: &str) -> Self {
        self.failing.insert(parent_id.to_string());
        self
    }

    fn check(&self, parent_id: &str) -> Result<()> {
        if self.failing.contains(parent_id) {
            return Err(SyncError::Transport(format!("injected listing failure for {}", parent_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn list_folders(&self, parent_id: &str) -> Result<Vec<RemoteEntry>> {
        self.check(parent_id)?;
        Ok(self.folders.get(parent_id).cloned().unwrap_or_default())
    }

    async fn list_audio(&self, parent_id: &str, mime_types: &[String]) -> Result<Vec<RemoteEntry>> {
        self.check(parent_id)?;
        let files = self.files.get(parent_id).cloned().unwrap_or_default();
        Ok(files
            .into_iter()
            .filter(|f| {
                f.mime_type
                    .as_deref()
                    .map(|m| mime_types.iter().any(|t| t.eq_ignore_ascii_case(m)))
                    .unwrap_or(false)
            })
            .collect())
    }

    fn source_locator(&self, item_id: &str) -> String {
        format!("memory://{}", item_id)
    }

    async fn fetch_media(&self, item_id: &str) -> Result<Vec<u8>> {
        info!("StaticCatalogSource: fetch_media {}", item_id);
        self.media.get(item_id).cloned().ok_or(SyncError::NotFound)
    }
}

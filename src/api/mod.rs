pub mod drive;
pub mod github;
pub mod mock;

use crate::error::Result;
use crate::models::{Revision, SharedStateDocument};
use serde::Deserialize;

/// Versioned storage for the single shared document.
/// Implementations: github::GithubDocumentStore, mock::InMemoryDocumentStore.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch and decode the document together with its revision.
    /// Returns `SyncError::NotFound` when the document does not exist yet.
    async fn read(&self) -> Result<(SharedStateDocument, Revision)>;

    /// Replace the document. `expected` is the revision the caller last saw,
    /// `None` when creating it. A stale revision yields `SyncError::RevisionConflict`.
    async fn write(
        &self,
        document: &SharedStateDocument,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision>;

    /// Current revision without decoding the content, so a malformed remote copy
    /// can still be overwritten. `None` when the document does not exist.
    async fn current_revision(&self) -> Result<Option<Revision>> {
        match self.read().await {
            Ok((_, rev)) => Ok(Some(rev)),
            Err(crate::error::SyncError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Backend name (for logging and status output).
    fn name(&self) -> &str;
}

/// One entry of a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Remote file tree the playlist is built from.
/// Implementations: drive::DriveCatalogSource, mock::StaticCatalogSource.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Sub-folders of `parent_id`, ordered by name by the backend.
    async fn list_folders(&self, parent_id: &str) -> Result<Vec<RemoteEntry>>;

    /// Audio files of `parent_id` whose MIME type is in `mime_types`, ordered by name by the backend.
    async fn list_audio(&self, parent_id: &str, mime_types: &[String]) -> Result<Vec<RemoteEntry>>;

    /// Locator a media player can fetch the item from.
    fn source_locator(&self, item_id: &str) -> String;

    /// Raw bytes of an item.
    async fn fetch_media(&self, item_id: &str) -> Result<Vec<u8>>;

    fn name(&self) -> &str;
}

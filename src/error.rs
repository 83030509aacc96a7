//! Error taxonomy shared by the document store, the catalog and the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote document does not exist yet. Callers substitute the default document.
    #[error("remote document not found")]
    NotFound,

    /// Network/HTTP failure, including a remote call that exceeded its bounded wait.
    #[error("transport error: {0}")]
    Transport(String),

    /// The expected revision no longer matches the store's current revision.
    #[error("revision conflict: remote document changed since it was read")]
    RevisionConflict,

    /// Remote content could not be decoded into a valid document or listing.
    #[error("malformed remote content: {0}")]
    Decoding(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Local settings store failure.
    #[error("local storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Everything except missing credentials degrades to a disconnected/empty state.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::MissingCredentials(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Transport(format!("request timed out: {}", e))
        } else if e.is_decode() {
            SyncError::Decoding(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Decoding(e.to_string())
    }
}

impl From<base64::DecodeError> for SyncError {
    fn from(e: base64::DecodeError) -> Self {
        SyncError::Decoding(format!("base64: {}", e))
    }
}

impl From<std::string::FromUtf8Error> for SyncError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        SyncError::Decoding(format!("utf-8: {}", e))
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Storage(e.to_string())
    }
}

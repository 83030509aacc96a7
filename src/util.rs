use base64::{engine::general_purpose, Engine as _};
use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::models::SharedStateDocument;

/// Base64 of the UTF-8 bytes of `text`. Multi-byte characters survive intact.
pub fn encode_content(text: &str) -> String {
    general_purpose::STANDARD.encode(text.as_bytes())
}

/// Inverse of `encode_content`. Content APIs wrap base64 at 60/76 columns,
/// so ASCII whitespace is stripped before decoding.
pub fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn encode_document(doc: &SharedStateDocument) -> Result<String> {
    Ok(encode_content(&doc.to_json()?))
}

pub fn decode_document(encoded: &str) -> Result<SharedStateDocument> {
    SharedStateDocument::from_json(&decode_content(encoded)?)
}

/// Run a remote call with a bounded wait; elapsing is reported as a transport error.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(SyncError::Transport(format!(
            "{} timed out after {} ms",
            what,
            limit.as_millis()
        ))),
    }
}

use super::{CatalogSource, RemoteEntry};
use crate::config::Config;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct FilesListResponse {
    #[serde(default)]
    files: Vec<RemoteEntry>,
}

/// Google Drive v3 file listing, authenticated with an API key.
pub struct DriveCatalogSource {
    client: Client,
    api_base: String,
    api_key: String,
}

impl DriveCatalogSource {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(cfg: &Config, api_key: &str) -> Result<Self> {
        Self::new(&cfg.drive_api_base, api_key, cfg.request_timeout())
    }

    async fn list(&self, query: &str, fields: &str) -> Result<Vec<RemoteEntry>> {
        let url = format!("{}/files", self.api_base);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("orderBy", "name"),
                ("fields", fields),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!("list files failed: {} => {}", status, txt)));
        }
        let j: FilesListResponse = resp.json().await?;
        debug!("drive query [{}] returned {} entries", query, j.files.len());
        Ok(j.files)
    }
}

fn audio_query(parent_id: &str, mime_types: &[String]) -> String {
    let alternatives = mime_types
        .iter()
        .map(|m| format!("mimeType='{}'", m))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("'{}' in parents and ({})", parent_id, alternatives)
}

#[async_trait]
impl CatalogSource for DriveCatalogSource {
    fn name(&self) -> &str {
        "drive"
    }

    async fn list_folders(&self, parent_id: &str) -> Result<Vec<RemoteEntry>> {
        let q = format!("'{}' in parents and mimeType='{}'", parent_id, FOLDER_MIME);
        self.list(&q, "files(id,name)").await
    }

    async fn list_audio(&self, parent_id: &str, mime_types: &[String]) -> Result<Vec<RemoteEntry>> {
        if mime_types.is_empty() {
            return Ok(Vec::new());
        }
        self.list(&audio_query(parent_id, mime_types), "files(id,name,mimeType)").await
    }

    fn source_locator(&self, item_id: &str) -> String {
        format!("{}/files/{}?alt=media", self.api_base, item_id)
    }

    async fn fetch_media(&self, item_id: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(format!("{}/files/{}", self.api_base, item_id))
            .query(&[("alt", "media"), ("key", self.api_key.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound);
        }
        if !status.is_success() {
            return Err(SyncError::Transport(format!("fetch media {} failed: {}", item_id, status)));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_query_lists_every_type() {
        let q = audio_query("abc", &["audio/mpeg".to_string(), "audio/aac".to_string()]);
        assert_eq!(q, "'abc' in parents and (mimeType='audio/mpeg' or mimeType='audio/aac')");
    }
}

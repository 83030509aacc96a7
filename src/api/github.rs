use super::DocumentStore;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::{Revision, SharedStateDocument};
use crate::util;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

/// Shared document stored as a file in a GitHub repository via the contents API.
/// The blob SHA is the revision; GitHub rejects a PUT whose `sha` is stale.
pub struct GithubDocumentStore {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
    branch: Option<String>,
    token: String,
}

impl GithubDocumentStore {
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        path: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hearing-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.trim_start_matches('/').to_string(),
            branch: None,
            token: token.to_string(),
        })
    }

    pub fn from_config(cfg: &Config, token: &str) -> Result<Self> {
        let mut store = Self::new(
            &cfg.github_api_base,
            &cfg.repo_owner,
            &cfg.repo_name,
            &cfg.document_path,
            token,
            cfg.request_timeout(),
        )?;
        store.branch = cfg.branch.clone();
        Ok(store)
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, self.repo, self.path
        )
    }

    fn auth(&self) -> String {
        format!("token {}", self.token)
    }

    async fn get_contents(&self) -> Result<ContentsResponse> {
        let mut req = self
            .client
            .get(self.contents_url())
            .header(AUTHORIZATION, self.auth())
            .header(ACCEPT, GITHUB_ACCEPT);
        if let Some(b) = &self.branch {
            req = req.query(&[("ref", b.as_str())]);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{} does not exist yet in {}/{}", self.path, self.owner, self.repo);
            return Err(SyncError::NotFound);
        }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!("GET contents failed: {} => {}", status, txt)));
        }
        let body: ContentsResponse = resp.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl DocumentStore for GithubDocumentStore {
    fn name(&self) -> &str {
        "github"
    }

    async fn read(&self) -> Result<(SharedStateDocument, Revision)> {
        let body = self.get_contents().await?;
        if let Some(enc) = body.encoding.as_deref() {
            if enc != "base64" {
                return Err(SyncError::Decoding(format!("unsupported content encoding {}", enc)));
            }
        }
        let doc = util::decode_document(&body.content)?;
        debug!("read {} at revision {} ({} history events)", self.path, body.sha, doc.history.len());
        Ok((doc, Revision::new(body.sha)))
    }

    async fn current_revision(&self) -> Result<Option<Revision>> {
        match self.get_contents().await {
            Ok(body) => Ok(Some(Revision::new(body.sha))),
            Err(SyncError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(
        &self,
        document: &SharedStateDocument,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision> {
        let mut body = json!({
            "message": message,
            "content": util::encode_document(document)?,
        });
        if let Some(rev) = expected {
            body["sha"] = json!(rev.as_str());
        }
        if let Some(b) = &self.branch {
            body["branch"] = json!(b);
        }

        let resp = self
            .client
            .put(self.contents_url())
            .header(AUTHORIZATION, self.auth())
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            let j: PutResponse = resp.json().await?;
            return Ok(Revision::new(j.content.sha));
        }

        let txt = resp.text().await.unwrap_or_default();
        // 409: sha does not match the current blob. 422: sha missing for an existing file.
        if status == StatusCode::CONFLICT
            || (status == StatusCode::UNPROCESSABLE_ENTITY && txt.contains("sha"))
        {
            warn!("PUT {} rejected as stale ({}): {}", self.path, status, txt);
            return Err(SyncError::RevisionConflict);
        }
        Err(SyncError::Transport(format!("PUT contents failed: {} => {}", status, txt)))
    }
}

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogLayout {
    /// Audio files directly under the root folder.
    Flat,
    /// Group folders under the root, each holding audio files.
    Grouped,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        CatalogLayout::Grouped
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Owner and name of the repository that hosts the shared document.
    pub repo_owner: String,
    pub repo_name: String,
    #[serde(default = "default_document_path")]
    pub document_path: String,
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,

    /// Upper bound for every remote call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub catalog_layout: CatalogLayout,

    /// MIME types treated as playable. Case-insensitive.
    #[serde(default = "default_audio_mime_types")]
    pub audio_mime_types: Vec<String>,

    #[serde(default = "default_skip_seconds")]
    pub skip_seconds: f64,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_document_path() -> String { "database.json".into() }
fn default_github_api_base() -> String { "https://api.github.com".into() }
fn default_drive_api_base() -> String { "https://www.googleapis.com/drive/v3".into() }
fn default_request_timeout_ms() -> u64 { 15_000 }
fn default_skip_seconds() -> f64 { 5.0 }

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hearing-sync")
        .join("hearing-sync.db")
}

fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hearing-sync")
        .join("logs")
}

pub fn default_audio_mime_types() -> Vec<String> {
    vec![
        "audio/mpeg",
        "audio/mp3",
        "audio/wav",
        "audio/m4a",
        "audio/mp4",
        "audio/aac",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.repo_owner.trim().is_empty() || self.repo_name.trim().is_empty() {
            anyhow::bail!("repo_owner and repo_name must be set");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be greater than zero");
        }
        if !(self.skip_seconds.is_finite() && self.skip_seconds > 0.0) {
            anyhow::bail!("skip_seconds must be a positive number");
        }
        for (name, base) in [
            ("github_api_base", &self.github_api_base),
            ("drive_api_base", &self.drive_api_base),
        ] {
            let u = url::Url::parse(base)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", name, base, e))?;
            if !matches!(u.scheme(), "http" | "https") {
                anyhow::bail!("{} must be an http(s) URL: {}", name, base);
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

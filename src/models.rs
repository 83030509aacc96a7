use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SyncError};

/// One playable entry of the catalog. Identity is `id`; the names only feed the matching label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub id: String,
    pub display_name: String,
    pub group_name: Option<String>,
    pub source_locator: String,
}

impl PlayableItem {
    /// Label written to history: "{group} / {name}" for grouped items, bare name otherwise.
    pub fn label(&self) -> String {
        match &self.group_name {
            Some(g) => format!("{} / {}", g, self.display_name),
            None => self.display_name.clone(),
        }
    }

    /// Accepts the bare name and both grouped spellings ("G / a" and "G/a")
    /// so labels recorded by older clients still resolve.
    pub fn matches_label(&self, label: &str) -> bool {
        if label.is_empty() {
            return false;
        }
        if self.display_name == label {
            return true;
        }
        match &self.group_name {
            Some(g) => {
                label == format!("{} / {}", g, self.display_name)
                    || label == format!("{}/{}", g, self.display_name)
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Start,
    Stop,
}

impl fmt::Display for PlaybackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackAction::Start => write!(f, "start"),
            PlaybackAction::Stop => write!(f, "stop"),
        }
    }
}

/// Append-only history entry. Field names follow the stored document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub action: PlaybackAction,
    #[serde(rename = "file")]
    pub file_label: String,
    #[serde(rename = "time")]
    pub offset_seconds: f64,
    #[serde(rename = "timestamp")]
    pub occurred_at: DateTime<Utc>,
}

/// The single remote record holding the resume point and the full play history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedStateDocument {
    #[serde(rename = "currentFile")]
    pub current_file_label: String,
    #[serde(rename = "currentTime")]
    pub current_offset_seconds: f64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub history: Vec<PlaybackEvent>,
}

impl Default for SharedStateDocument {
    fn default() -> Self {
        Self::empty(Utc::now())
    }
}

impl SharedStateDocument {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            current_file_label: String::new(),
            current_offset_seconds: 0.0,
            last_updated: now,
            history: Vec::new(),
        }
    }

    /// Append an event and move the current pointer to it.
    pub fn apply(&mut self, event: PlaybackEvent) {
        self.current_file_label = event.file_label.clone();
        self.current_offset_seconds = event.offset_seconds;
        self.last_updated = event.occurred_at;
        self.history.push(event);
    }

    pub fn last_event(&self) -> Option<&PlaybackEvent> {
        self.history.last()
    }

    /// Structural checks serde cannot express. A negative current offset is tolerated
    /// (it is clamped when resuming); history offsets must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if !self.current_offset_seconds.is_finite() {
            return Err(SyncError::Decoding("currentTime is not a finite number".into()));
        }
        for (i, ev) in self.history.iter().enumerate() {
            if !ev.offset_seconds.is_finite() || ev.offset_seconds < 0.0 {
                return Err(SyncError::Decoding(format!(
                    "history[{}].time must be a non-negative number, got {}",
                    i, ev.offset_seconds
                )));
            }
        }
        Ok(())
    }

    /// Two-space indented JSON, the layout the stored document has always used.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let doc: SharedStateDocument = serde_json::from_str(s)?;
        doc.validate()?;
        Ok(doc)
    }
}

/// Opaque version token of the remote document (a content SHA for the GitHub backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tokens needed by every remote call. The serialized names match the persisted local copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "googleDriveToken", default)]
    pub drive_token: String,
    #[serde(rename = "githubToken", default)]
    pub repo_token: String,
    #[serde(rename = "driveFolderId", default)]
    pub folder_id: String,
}

impl Credentials {
    pub fn new(drive_token: impl Into<String>, repo_token: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            drive_token: drive_token.into(),
            repo_token: repo_token.into(),
            folder_id: folder_id.into(),
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.drive_token.trim().is_empty() {
            out.push("googleDriveToken");
        }
        if self.repo_token.trim().is_empty() {
            out.push("githubToken");
        }
        if self.folder_id.trim().is_empty() {
            out.push("driveFolderId");
        }
        out
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, group: Option<&str>) -> PlayableItem {
        PlayableItem {
            id: "1".into(),
            display_name: name.into(),
            group_name: group.map(String::from),
            source_locator: "loc".into(),
        }
    }

    #[test]
    fn grouped_label_accepts_both_spellings() {
        let it = item("a.mp3", Some("G"));
        assert_eq!(it.label(), "G / a.mp3");
        assert!(it.matches_label("G / a.mp3"));
        assert!(it.matches_label("G/a.mp3"));
        assert!(it.matches_label("a.mp3"));
        assert!(!it.matches_label("G /a.mp3"));
        assert!(!it.matches_label(""));
    }

    #[test]
    fn apply_moves_current_pointer() {
        let mut doc = SharedStateDocument::empty(Utc::now());
        let ev = PlaybackEvent {
            action: PlaybackAction::Stop,
            file_label: "G / a.mp3".into(),
            offset_seconds: 42.5,
            occurred_at: Utc::now(),
        };
        doc.apply(ev.clone());
        assert_eq!(doc.current_file_label, "G / a.mp3");
        assert_eq!(doc.current_offset_seconds, 42.5);
        assert_eq!(doc.last_updated, ev.occurred_at);
        assert_eq!(doc.history, vec![ev]);
    }

    #[test]
    fn reads_stored_document_format() {
        let raw = r#"{
  "currentFile": "Book / ch1.mp3",
  "currentTime": 12.3,
  "lastUpdated": "2024-05-01T10:00:00.000Z",
  "history": [
    {"action": "start", "file": "Book / ch1.mp3", "time": 0, "timestamp": "2024-05-01T09:59:00.000Z"}
  ]
}"#;
        let doc = SharedStateDocument::from_json(raw).unwrap();
        assert_eq!(doc.current_file_label, "Book / ch1.mp3");
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.history[0].action, PlaybackAction::Start);
    }

    #[test]
    fn missing_fields_are_a_decoding_error() {
        let err = SharedStateDocument::from_json(r#"{"currentFile": "x"}"#).unwrap_err();
        assert!(matches!(err, SyncError::Decoding(_)));
    }

    #[test]
    fn negative_history_offset_is_rejected() {
        let raw = r#"{"currentFile":"x","currentTime":0,"lastUpdated":"2024-05-01T10:00:00Z",
            "history":[{"action":"stop","file":"x","time":-1,"timestamp":"2024-05-01T10:00:00Z"}]}"#;
        assert!(matches!(SharedStateDocument::from_json(raw), Err(SyncError::Decoding(_))));
    }

    #[test]
    fn credentials_report_missing_fields() {
        let c = Credentials::new("drive", "", " ");
        assert_eq!(c.missing_fields(), vec!["githubToken", "driveFolderId"]);
        assert!(!c.is_complete());
        assert!(Credentials::new("a", "b", "c").is_complete());
    }
}

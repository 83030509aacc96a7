use crate::error::Result;
use crate::models::Credentials;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Fixed key under which the local copy of the credentials is kept.
pub const CREDENTIALS_KEY: &str = "hearing_credentials";

const SCHEMA: &str = include_str!("../db/schema.sql");

pub fn open_or_create(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::error::SyncError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
    }
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn save_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

pub fn load_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |r| r.get(0))
        .optional()?;
    Ok(v)
}

/// Persist the credentials as plain JSON text under `CREDENTIALS_KEY`.
pub fn save_credentials(conn: &Connection, creds: &Credentials) -> Result<()> {
    let s = serde_json::to_string(creds)?;
    save_setting(conn, CREDENTIALS_KEY, &s)
}

pub fn load_credentials(conn: &Connection) -> Result<Option<Credentials>> {
    match load_setting(conn, CREDENTIALS_KEY)? {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

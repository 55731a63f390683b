//! Local UI preferences: column visibility and mail folder layout.
//!
//! Both are plain JSON arrays keyed by name; there is no schema version, so a
//! blob that no longer decodes is treated as absent.

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::models::MailFolder;
use crate::error::{Error, Result};

const COLUMN_VISIBILITY: &str = "column_visibility";
const FOLDER_LAYOUT: &str = "folder_layout";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSetting {
    pub id: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderSetting {
    pub id: String,
    pub visible: bool,
    pub order: i32,
}

fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "NexusCRM")?;
    let dir = proj.data_dir().to_path_buf();
    Some(dir.join("preferences.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub struct PreferenceStore {
    conn: Connection,
}

impl PreferenceStore {
    pub fn open_default() -> Result<Self> {
        let path = db_path().ok_or_else(|| Error::Config("no data dir".into()))?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        ensure_dir(path)?;
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            r#"
            INSERT INTO preferences (key, value_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value_json=excluded.value_json,
                updated_at=excluded.updated_at
            "#,
            params![key, json, now],
        )?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("discarding stored {key}: {e}");
                None
            }
        }))
    }

    pub fn column_visibility(&self) -> Result<Vec<ColumnSetting>> {
        Ok(self.get(COLUMN_VISIBILITY)?.unwrap_or_default())
    }

    pub fn set_column_visibility(&self, columns: &[ColumnSetting]) -> Result<()> {
        self.put(COLUMN_VISIBILITY, &columns)
    }

    pub fn folder_layout(&self) -> Result<Vec<FolderSetting>> {
        Ok(self.get(FOLDER_LAYOUT)?.unwrap_or_default())
    }

    pub fn set_folder_layout(&self, folders: &[FolderSetting]) -> Result<()> {
        self.put(FOLDER_LAYOUT, &folders)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM preferences", [])?;
        Ok(())
    }

    #[cfg(test)]
    fn put_raw(&self, key: &str, json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value_json, updated_at) VALUES (?1, ?2, 0)",
            params![key, json],
        )?;
        Ok(())
    }
}

/// Whether a column is shown. Columns without a setting are visible.
pub fn column_visible(settings: &[ColumnSetting], id: &str) -> bool {
    settings.iter().find(|c| c.id == id).is_none_or(|c| c.visible)
}

/// Orders and filters mail folders according to the saved layout.
///
/// Folders without a setting are shown after the configured ones, in server order.
pub fn apply_folder_layout<'a>(folders: &'a [MailFolder], layout: &[FolderSetting]) -> Vec<&'a MailFolder> {
    let mut out: Vec<(i32, usize, &MailFolder)> = folders
        .iter()
        .enumerate()
        .filter_map(|(idx, f)| match layout.iter().find(|s| s.id == f.id) {
            Some(s) if !s.visible => None,
            Some(s) => Some((s.order, idx, f)),
            None => Some((i32::MAX, idx, f)),
        })
        .collect();
    out.sort_by_key(|(order, idx, _)| (*order, *idx));
    out.into_iter().map(|(_, _, f)| f).collect()
}

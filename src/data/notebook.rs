//! SQLite notebook store with externalized image assets

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::store::{NotebookStore, NotebookSummary};
use super::StorageError;
use crate::model::{Id, Notebook, OutputKind};

/// Image outputs larger than this (in encoded bytes) are stored as assets
pub const DEFAULT_ASSET_THRESHOLD: usize = 16 * 1024;

/// Prefix of an asset reference inside a stored document
pub const ASSET_REF_PREFIX: &str = "asset:";

/// A binary asset row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Data access object for the `notebooks` and `assets` tables
#[derive(Clone)]
pub struct SqliteNotebookStore {
    conn: Arc<Mutex<Connection>>,
    asset_threshold: usize,
}

impl SqliteNotebookStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            asset_threshold: DEFAULT_ASSET_THRESHOLD,
        }
    }

    pub fn with_asset_threshold(mut self, bytes: usize) -> Self {
        self.asset_threshold = bytes;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Store raw bytes for a saved notebook; returns the content-addressed id.
    /// Assets stored this way live until the notebook is deleted; saving the
    /// notebook never prunes them.
    pub fn save_asset(
        &self,
        notebook_id: &Id,
        mime_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let id = asset_id(data);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO assets (id, notebook_id, mime_type, data, created_at, managed)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT(id, notebook_id) DO UPDATE SET managed = 0",
            params![
                id,
                notebook_id.as_str(),
                mime_type,
                data,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(id)
    }

    pub fn load_asset(&self, notebook_id: &Id, id: &str) -> Result<Option<Asset>, StorageError> {
        let conn = self.lock()?;
        Ok(select_asset(&conn, notebook_id, id)?)
    }

    /// Asset ids stored for a notebook
    pub fn asset_ids(&self, notebook_id: &Id) -> Result<Vec<String>, StorageError> {
        let conn = self.lock()?;
        Ok(select_asset_ids(&conn, notebook_id)?)
    }

    /// Replace large inline images with asset references
    fn externalize(&self, notebook: &mut Notebook) -> Vec<Asset> {
        let mut assets = Vec::new();
        for chapter in notebook.chapters_mut() {
            for cell in chapter.cells_mut() {
                let Some(output) = cell.output_mut() else {
                    continue;
                };
                if output.kind != OutputKind::Image || output.content.len() <= self.asset_threshold
                {
                    continue;
                }
                let Some((mime_type, data)) = decode_data_uri(&output.content) else {
                    continue;
                };
                let id = asset_id(&data);
                output.content = format!("{ASSET_REF_PREFIX}{id}");
                assets.push(Asset {
                    id,
                    mime_type,
                    data,
                });
            }
        }
        assets
    }

    /// Inline every asset reference back into a data URI
    fn internalize(conn: &Connection, notebook: &mut Notebook) -> Result<(), StorageError> {
        let notebook_id = notebook.id().clone();
        for chapter in notebook.chapters_mut() {
            for cell in chapter.cells_mut() {
                let Some(output) = cell.output_mut() else {
                    continue;
                };
                let Some(id) = output.content.strip_prefix(ASSET_REF_PREFIX) else {
                    continue;
                };
                match select_asset(conn, &notebook_id, id)? {
                    Some(asset) => {
                        output.content = format!(
                            "data:{};base64,{}",
                            asset.mime_type,
                            STANDARD.encode(&asset.data)
                        );
                    }
                    None => {
                        tracing::warn!(notebook_id = %notebook_id, asset_id = %id, "Referenced asset missing");
                    }
                }
            }
        }
        Ok(())
    }
}

impl NotebookStore for SqliteNotebookStore {
    fn save(&self, notebook: &Notebook) -> Result<(), StorageError> {
        let mut stored = notebook.clone();
        let assets = self.externalize(&mut stored);
        let document = stored.to_json()?;
        let id = notebook.id().to_string();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO notebooks (id, title, document, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET title = ?2, document = ?3, updated_at = ?5",
            params![
                id,
                notebook.title,
                document,
                timestamp(notebook.metadata.created_at),
                timestamp(notebook.updated_at()),
            ],
        )?;

        let keep: HashSet<&str> = assets.iter().map(|a| a.id.as_str()).collect();
        for asset in &assets {
            insert_managed_asset(&tx, notebook.id(), &asset.id, &asset.mime_type, &asset.data)?;
        }
        for stale in select_managed_asset_ids(&tx, notebook.id())? {
            if !keep.contains(stale.as_str()) {
                tx.execute(
                    "DELETE FROM assets WHERE id = ?1 AND notebook_id = ?2",
                    params![stale, id],
                )?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            notebook_id = %id,
            bytes = document.len(),
            assets = assets.len(),
            "Notebook saved"
        );
        Ok(())
    }

    fn load(&self, id: &Id) -> Result<Option<Notebook>, StorageError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT document FROM notebooks WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let mut notebook = Notebook::from_json(&raw)?;
        Self::internalize(&conn, &mut notebook)?;
        Ok(Some(notebook))
    }

    fn delete(&self, id: &Id) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM notebooks WHERE id = ?1", params![id.as_str()])?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<NotebookSummary>, StorageError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, title, updated_at FROM notebooks ORDER BY updated_at DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summaries = Vec::with_capacity(rows.len());
        for (id, title, updated_at) in rows {
            let id = Id::from(id);
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            summaries.push(NotebookSummary {
                id,
                title,
                updated_at,
            });
        }
        Ok(summaries)
    }
}

/// Fixed-width RFC 3339 so lexical order matches time order
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Hex SHA-256 of the bytes
pub fn asset_id(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Split `data:{mime};base64,{payload}` into mime type and decoded bytes.
/// Only canonical payloads are accepted so re-encoding is lossless.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let data = STANDARD.decode(payload).ok()?;
    if STANDARD.encode(&data) != payload {
        return None;
    }
    Some((mime_type.to_string(), data))
}

/// Insert an asset split out of a document. An existing row keeps its
/// `managed` flag, so an asset also stored explicitly is never pruned.
fn insert_managed_asset(
    conn: &Connection,
    notebook_id: &Id,
    id: &str,
    mime_type: &str,
    data: &[u8],
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO assets (id, notebook_id, mime_type, data, created_at, managed)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        params![
            id,
            notebook_id.as_str(),
            mime_type,
            data,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn select_asset(conn: &Connection, notebook_id: &Id, id: &str) -> rusqlite::Result<Option<Asset>> {
    conn.query_row(
        "SELECT id, mime_type, data FROM assets WHERE id = ?1 AND notebook_id = ?2",
        params![id, notebook_id.as_str()],
        |row| {
            Ok(Asset {
                id: row.get(0)?,
                mime_type: row.get(1)?,
                data: row.get(2)?,
            })
        },
    )
    .optional()
}

fn select_asset_ids(conn: &Connection, notebook_id: &Id) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM assets WHERE notebook_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![notebook_id.as_str()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

fn select_managed_asset_ids(conn: &Connection, notebook_id: &Id) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM assets WHERE notebook_id = ?1 AND managed = 1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![notebook_id.as_str()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

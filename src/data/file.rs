//! Explicit file export and import
//!
//! Nothing here persists implicitly: files are written and read only when
//! the user asks.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use zip::write::FileOptions;

use super::StorageError;
use crate::export::{self, ExportFormat};
use crate::model::Notebook;
use crate::snapshot::SnapshotError;

/// Marker preceding the embedded document in an HTML export
static EMBED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\.NOTEBOOK_DATA\s*=\s*").expect("embed marker pattern is valid")
});

pub struct FileStore;

/// Per-chapter pages packed into one archive
fn chapters_zip(notebook: &Notebook) -> Result<Vec<u8>, StorageError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, page) in export::chapter_pages(notebook)? {
        zip.start_file(name, options)?;
        zip.write_all(page.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

impl FileStore {
    /// Write `notebook` to `path` in the requested format
    pub fn export(
        notebook: &Notebook,
        path: &Path,
        format: ExportFormat,
    ) -> Result<(), StorageError> {
        let body = match format {
            ExportFormat::Notebook => notebook.to_json()?.into_bytes(),
            ExportFormat::Html => export::to_html(notebook)?.into_bytes(),
            ExportFormat::InteractiveHtml => export::to_interactive_html(notebook)?.into_bytes(),
            ExportFormat::Markdown => export::to_markdown(notebook).into_bytes(),
            ExportFormat::ChaptersZip => chapters_zip(notebook)?,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, body)?;
        tracing::info!(
            notebook_id = %notebook.id(),
            path = %path.display(),
            format = format.as_str(),
            "Notebook exported"
        );
        Ok(())
    }

    /// Default file name for an export: the title reduced to safe characters
    pub fn default_file_name(notebook: &Notebook, format: ExportFormat) -> PathBuf {
        let stem: String = notebook
            .title
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        let stem = stem.trim_matches('_');
        let stem = if stem.is_empty() { "notebook" } else { stem };
        PathBuf::from(format!("{stem}.{}", format.extension()))
    }

    /// Read a notebook document or an HTML export embedding one
    pub fn import(path: &Path) -> Result<Notebook, StorageError> {
        let raw = std::fs::read_to_string(path)?;
        let notebook = Self::parse(&raw)?;
        tracing::info!(
            notebook_id = %notebook.id(),
            path = %path.display(),
            "Notebook imported"
        );
        Ok(notebook)
    }

    /// Parse file contents. All-or-nothing: a malformed document yields an
    /// error and no notebook.
    pub fn parse(raw: &str) -> Result<Notebook, SnapshotError> {
        if raw.trim_start().starts_with('{') {
            return Notebook::from_json(raw);
        }
        let found = EMBED_MARKER
            .find(raw)
            .ok_or_else(|| SnapshotError::Malformed("no embedded notebook data".to_string()))?;
        let mut values =
            serde_json::Deserializer::from_str(&raw[found.end()..]).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(value)) => Notebook::from_value(value),
            Some(Err(e)) => Err(SnapshotError::Malformed(e.to_string())),
            None => Err(SnapshotError::Malformed(
                "embedded notebook data is empty".to_string(),
            )),
        }
    }
}

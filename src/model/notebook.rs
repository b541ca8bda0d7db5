//! Notebook: the top-level document owning every chapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, Cell, Chapter, Id, Metadata, ModelError};
use crate::snapshot::SnapshotError;

/// Current document format version
pub const FORMAT_VERSION: &str = "1.0.0";

/// Default autosave interval in milliseconds
pub const DEFAULT_AUTOSAVE_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookMetadata {
    pub version: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unknown keys are carried through untouched
    #[serde(flatten)]
    pub extra: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotebookSettings {
    pub theme: String,
    pub default_language: String,
    pub auto_save: bool,
    /// Milliseconds between autosaves
    pub auto_save_interval: u64,
}

impl Default for NotebookSettings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            default_language: "python".to_string(),
            auto_save: true,
            auto_save_interval: DEFAULT_AUTOSAVE_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    chapters: Vec<Chapter>,
    pub metadata: NotebookMetadata,
    #[serde(default)]
    pub settings: NotebookSettings,
    #[serde(default)]
    active_chapter_id: Option<Id>,
}

impl Notebook {
    /// Create a notebook with the default first chapter
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let mut notebook = Self::empty(title, description);
        notebook.add_chapter(
            Chapter::with_cells(
                "Chapter 1",
                vec![
                    Cell::markdown("# Welcome\n\nStart writing here..."),
                    Cell::code("print(\"Hello, World!\")", "python"),
                ],
            ),
            None,
        );
        notebook
    }

    /// Notebook with no chapters yet. Only used internally while assembling
    /// a document; public constructors always produce at least one chapter.
    fn empty(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Id::generate(),
            title: title.into(),
            description: description.into(),
            chapters: Vec::new(),
            metadata: NotebookMetadata {
                version: FORMAT_VERSION.to_string(),
                created_at: now,
                updated_at: now,
                author: String::new(),
                tags: Vec::new(),
                extra: Metadata::new(),
            },
            settings: NotebookSettings::default(),
            active_chapter_id: None,
        }
    }

    /// Build a notebook from explicit chapters (at least one is required)
    pub fn from_chapters(
        title: impl Into<String>,
        chapters: Vec<Chapter>,
    ) -> Result<Self, ModelError> {
        if chapters.is_empty() {
            return Err(ModelError::LastChapter);
        }
        let mut notebook = Self::empty(title, "");
        for chapter in chapters {
            notebook.add_chapter(chapter, None);
        }
        Ok(notebook)
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Chapter access that leaves `updatedAt` alone
    pub(crate) fn chapters_mut(&mut self) -> &mut [Chapter] {
        &mut self.chapters
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.metadata.updated_at
    }

    // ============================================================
    // Chapters
    // ============================================================

    /// Insert a chapter at `index` (clamped) or append; the first chapter
    /// added becomes active
    pub fn add_chapter(&mut self, chapter: Chapter, index: Option<usize>) -> Id {
        let id = chapter.id().clone();
        match index {
            Some(i) => {
                let i = i.min(self.chapters.len());
                self.chapters.insert(i, chapter);
            }
            None => self.chapters.push(chapter),
        }
        self.reindex_chapters();
        if self.active_chapter_id.is_none() {
            self.active_chapter_id = Some(id.clone());
        }
        self.touch();
        id
    }

    /// Remove a chapter and its cells. The last remaining chapter cannot be
    /// removed. If the active chapter goes, the first remaining one becomes
    /// active.
    pub fn remove_chapter(&mut self, chapter_id: &Id) -> Result<Chapter, ModelError> {
        let index = self
            .chapter_index(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        if self.chapters.len() <= 1 {
            return Err(ModelError::LastChapter);
        }
        let removed = self.chapters.remove(index);
        self.reindex_chapters();
        if self.active_chapter_id.as_ref() == Some(chapter_id) {
            self.active_chapter_id = self.chapters.first().map(|c| c.id().clone());
        }
        self.touch();
        Ok(removed)
    }

    /// Move a chapter to `new_index` (clamped)
    pub fn move_chapter(&mut self, chapter_id: &Id, new_index: usize) -> Result<(), ModelError> {
        let index = self
            .chapter_index(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        let chapter = self.chapters.remove(index);
        let new_index = new_index.min(self.chapters.len());
        self.chapters.insert(new_index, chapter);
        self.reindex_chapters();
        self.touch();
        Ok(())
    }

    pub fn rename_chapter(
        &mut self,
        chapter_id: &Id,
        title: impl Into<String>,
    ) -> Result<(), ModelError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        chapter.title = title.into();
        self.touch();
        Ok(())
    }

    pub fn chapter(&self, chapter_id: &Id) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == chapter_id)
    }

    pub fn chapter_mut(&mut self, chapter_id: &Id) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.id() == chapter_id)
    }

    fn chapter_index(&self, chapter_id: &Id) -> Option<usize> {
        self.chapters.iter().position(|c| c.id() == chapter_id)
    }

    // ============================================================
    // Active chapter
    // ============================================================

    pub fn active_chapter_id(&self) -> Option<&Id> {
        self.active_chapter_id.as_ref()
    }

    pub fn active_chapter(&self) -> Option<&Chapter> {
        self.active_chapter_id.as_ref().and_then(|id| self.chapter(id))
    }

    pub fn set_active_chapter(&mut self, chapter_id: &Id) -> Result<(), ModelError> {
        if self.chapter(chapter_id).is_none() {
            return Err(ModelError::ChapterNotFound(chapter_id.clone()));
        }
        self.active_chapter_id = Some(chapter_id.clone());
        Ok(())
    }

    // ============================================================
    // Cells
    // ============================================================

    pub fn add_cell(
        &mut self,
        chapter_id: &Id,
        cell: Cell,
        index: Option<usize>,
    ) -> Result<Id, ModelError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        let id = chapter.add_cell(cell, index);
        self.touch();
        Ok(id)
    }

    pub fn remove_cell(&mut self, chapter_id: &Id, cell_id: &Id) -> Result<Cell, ModelError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        let cell = chapter
            .remove_cell(cell_id)
            .ok_or_else(|| ModelError::CellNotFound(cell_id.clone()))?;
        self.touch();
        Ok(cell)
    }

    pub fn move_cell(
        &mut self,
        chapter_id: &Id,
        cell_id: &Id,
        new_index: usize,
    ) -> Result<(), ModelError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        if !chapter.move_cell(cell_id, new_index) {
            return Err(ModelError::CellNotFound(cell_id.clone()));
        }
        self.touch();
        Ok(())
    }

    /// Mutable access to a chapter for cell edits; bumps `updatedAt`
    pub fn edit_chapter<T>(
        &mut self,
        chapter_id: &Id,
        f: impl FnOnce(&mut Chapter) -> T,
    ) -> Result<T, ModelError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| ModelError::ChapterNotFound(chapter_id.clone()))?;
        let out = f(chapter);
        self.touch();
        Ok(out)
    }

    /// Locate a cell anywhere in the notebook
    pub fn find_cell(&self, cell_id: &Id) -> Option<(&Chapter, &Cell)> {
        self.chapters
            .iter()
            .find_map(|ch| ch.cell(cell_id).map(|cell| (ch, cell)))
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.chapters.iter().flat_map(|ch| ch.cells().iter())
    }

    pub fn code_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells()
            .filter(|c| c.cell_type() == super::CellType::Code)
    }

    // ============================================================
    // Serialization
    // ============================================================

    /// Pretty JSON document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate a JSON document. Nothing partial is returned: any
    /// failure yields a `SnapshotError`.
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let notebook: Notebook =
            serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        notebook.validated()
    }

    /// Same as `from_json` for an already-parsed value
    pub fn from_value(value: serde_json::Value) -> Result<Self, SnapshotError> {
        let notebook: Notebook =
            serde_json::from_value(value).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        notebook.validated()
    }

    fn validated(mut self) -> Result<Self, SnapshotError> {
        let major = self.metadata.version.split('.').next().unwrap_or_default();
        let expected = FORMAT_VERSION.split('.').next().unwrap_or_default();
        if major != expected {
            return Err(SnapshotError::UnsupportedVersion(
                self.metadata.version.clone(),
            ));
        }
        if self.chapters.is_empty() {
            return Err(SnapshotError::Malformed(
                "notebook has no chapters".to_string(),
            ));
        }
        self.reindex_chapters();
        let active_valid = self
            .active_chapter_id
            .as_ref()
            .is_some_and(|id| self.chapter(id).is_some());
        if !active_valid {
            self.active_chapter_id = self.chapters.first().map(|c| c.id().clone());
        }
        Ok(self)
    }

    fn reindex_chapters(&mut self) {
        for (i, chapter) in self.chapters.iter_mut().enumerate() {
            chapter.order = i;
        }
    }

    fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

//! Chapter/notebook controller
//!
//! One live region shows the active chapter. Switching chapters captures the
//! region, folds the capture back into the outgoing chapter, persists the
//! notebook, then rebuilds the region from the incoming chapter.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::data::{AutoSave, AutosaveTarget, NotebookStore, StorageError};
use crate::model::{Cell, CellStatus, CellType, Chapter, Id, ModelError, Notebook, OutputData};
use crate::snapshot::{
    capture, ArtifactKind, LiveRegion, RegionSnapshot, RestoreOptions, RestoreReport, Restorer,
    SectionCapture, SectionState, SectionView, SnapshotError, WidgetError, WidgetRegistry,
};

/// Name of the control holding a section's source text
const SOURCE_CONTROL: &str = "source";

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Cannot delete the last chapter")]
    LastChapter,
    #[error("Chapter not found: {0}")]
    ChapterNotFound(Id),
    #[error("Section not found: {0}")]
    SectionNotFound(String),
    #[error(transparent)]
    Model(ModelError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

impl From<ModelError> for ControllerError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::LastChapter => ControllerError::LastChapter,
            ModelError::ChapterNotFound(id) => ControllerError::ChapterNotFound(id),
            other => ControllerError::Model(other),
        }
    }
}

/// Where a chapter switch currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwitchPhase {
    #[default]
    Idle,
    Capturing,
    Persisting,
    Restoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible message for the host to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// One chapter tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterTab {
    pub id: Id,
    pub title: String,
    pub active: bool,
}

pub struct NotebookController<R: LiveRegion> {
    notebook: Notebook,
    region: R,
    store: Arc<dyn NotebookStore>,
    widgets: WidgetRegistry,
    options: RestoreOptions,
    phase: SwitchPhase,
    notices: VecDeque<Notice>,
    last_report: Option<RestoreReport>,
}

impl<R: LiveRegion> NotebookController<R> {
    pub fn new(
        notebook: Notebook,
        region: R,
        store: Arc<dyn NotebookStore>,
        widgets: WidgetRegistry,
    ) -> Self {
        Self {
            notebook,
            region,
            store,
            widgets,
            options: RestoreOptions::default(),
            phase: SwitchPhase::Idle,
            notices: VecDeque::new(),
            last_report: None,
        }
    }

    pub fn with_restore_options(mut self, options: RestoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    /// Direct access for user edits
    pub fn region_mut(&mut self) -> &mut R {
        &mut self.region
    }

    pub fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    pub fn phase(&self) -> SwitchPhase {
        self.phase
    }

    /// Report of the most recent restore into the region
    pub fn last_report(&self) -> Option<&RestoreReport> {
        self.last_report.as_ref()
    }

    /// Drain pending notices, oldest first
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    /// Render the active chapter into the region
    pub async fn open(&mut self) -> Result<RestoreReport, ControllerError> {
        self.render_active().await
    }

    // ============================================================
    // Chapters
    // ============================================================

    /// Show another chapter. Switching to the active chapter is a no-op.
    pub async fn switch_chapter(&mut self, chapter_id: &Id) -> Result<(), ControllerError> {
        if self.notebook.active_chapter_id() == Some(chapter_id) {
            return Ok(());
        }
        if self.notebook.chapter(chapter_id).is_none() {
            return Err(ControllerError::ChapterNotFound(chapter_id.clone()));
        }

        let result = self.switch_inner(chapter_id).await;
        self.phase = SwitchPhase::Idle;
        result
    }

    async fn switch_inner(&mut self, chapter_id: &Id) -> Result<(), ControllerError> {
        self.set_phase(SwitchPhase::Capturing);
        self.capture_active().await?;

        self.set_phase(SwitchPhase::Persisting);
        // A failed save is reported through a notice; the switch goes on
        let _ = self.persist();

        self.notebook.set_active_chapter(chapter_id)?;

        self.set_phase(SwitchPhase::Restoring);
        self.render_active().await?;

        tracing::info!(chapter_id = %chapter_id, "Switched chapter");
        Ok(())
    }

    fn set_phase(&mut self, phase: SwitchPhase) {
        tracing::debug!(?phase, "Chapter switch phase");
        self.phase = phase;
    }

    /// Create an empty chapter after the existing ones and switch to it
    pub async fn add_chapter(&mut self, title: &str) -> Result<Id, ControllerError> {
        self.capture_active().await?;

        let title = if title.trim().is_empty() {
            format!("Chapter {}", self.notebook.chapters().len() + 1)
        } else {
            title.trim().to_string()
        };
        let chapter_id = self.notebook.add_chapter(Chapter::new(title.clone()), None);
        self.notebook.set_active_chapter(&chapter_id)?;

        self.region.show_placeholder(&title);
        self.last_report = None;

        let _ = self.persist();
        tracing::info!(chapter_id = %chapter_id, title = %title, "Chapter added");
        Ok(chapter_id)
    }

    pub async fn rename_chapter(
        &mut self,
        chapter_id: &Id,
        title: &str,
    ) -> Result<(), ControllerError> {
        self.notebook.rename_chapter(chapter_id, title)?;
        if self.region.showing_placeholder() && self.notebook.active_chapter_id() == Some(chapter_id)
        {
            self.region.show_placeholder(title);
        }
        self.checkpoint().await
    }

    pub async fn move_chapter(
        &mut self,
        chapter_id: &Id,
        index: usize,
    ) -> Result<(), ControllerError> {
        self.notebook.move_chapter(chapter_id, index)?;
        self.checkpoint().await
    }

    /// Delete a chapter and its cells. The last chapter cannot be deleted.
    /// Deleting the active chapter shows the first remaining one.
    pub async fn delete_chapter(&mut self, chapter_id: &Id) -> Result<(), ControllerError> {
        if self.notebook.chapter(chapter_id).is_none() {
            return Err(ControllerError::ChapterNotFound(chapter_id.clone()));
        }
        if self.notebook.chapters().len() <= 1 {
            return Err(ControllerError::LastChapter);
        }

        let was_active = self.notebook.active_chapter_id() == Some(chapter_id);
        if !was_active {
            self.capture_active().await?;
        }
        let removed = self.notebook.remove_chapter(chapter_id)?;
        if was_active {
            self.render_active().await?;
        }

        let _ = self.persist();
        tracing::info!(chapter_id = %chapter_id, title = %removed.title, "Chapter deleted");
        Ok(())
    }

    /// Tab strip model, in chapter order
    pub fn tabs(&self) -> Vec<ChapterTab> {
        let active = self.notebook.active_chapter_id();
        self.notebook
            .chapters()
            .iter()
            .map(|chapter| ChapterTab {
                id: chapter.id().clone(),
                title: chapter.title.clone(),
                active: Some(chapter.id()) == active,
            })
            .collect()
    }

    /// Sections currently mounted in the region, in display order
    pub fn section_index(&self) -> Vec<SectionView> {
        self.region.sections()
    }

    /// Rename the notebook and persist
    pub async fn set_title(&mut self, title: &str) -> Result<(), ControllerError> {
        self.notebook.title = title.to_string();
        self.checkpoint().await
    }

    // ============================================================
    // Sections
    // ============================================================

    /// Run a section's widget and display its output
    pub async fn run_section(
        &mut self,
        section_id: &str,
    ) -> Result<Option<OutputData>, ControllerError> {
        let widget = self
            .region
            .widget(section_id)
            .ok_or_else(|| ControllerError::SectionNotFound(section_id.to_string()))?;
        let state = SectionState {
            id: section_id.to_string(),
            controls: self
                .region
                .controls()
                .into_iter()
                .filter(|c| c.section_id.as_deref() == Some(section_id))
                .collect(),
        };

        let cell_id = self.active_cell_id(section_id);
        if let Some(cell_id) = &cell_id {
            self.edit_active_cell(cell_id, |cell| {
                if matches!(cell.status(), CellStatus::Success | CellStatus::Error) {
                    cell.reset()?;
                }
                cell.begin_run()
            })?;
        }

        let output = match widget.run(&state).await {
            Ok(output) => output,
            Err(e) => {
                if let Some(cell_id) = &cell_id {
                    let failed = OutputData::error(e.to_string());
                    self.edit_active_cell(cell_id, |cell| cell.finish_run(failed))?;
                }
                return Err(e.into());
            }
        };

        if let Some(output) = &output {
            self.region
                .set_artifact(section_id, ArtifactKind::from(output.kind), &output.content);
        }
        if let Some(cell_id) = &cell_id {
            let finished = output.clone();
            self.edit_active_cell(cell_id, |cell| match finished {
                Some(output) => cell.finish_run(output),
                None => cell.transition(CellStatus::Success),
            })?;
        }
        tracing::debug!(section = %section_id, "Section ran");
        Ok(output)
    }

    fn active_cell_id(&self, section_id: &str) -> Option<Id> {
        self.notebook
            .active_chapter()?
            .cells()
            .iter()
            .find(|cell| cell.id() == section_id)
            .map(|cell| cell.id().clone())
    }

    fn edit_active_cell(
        &mut self,
        cell_id: &Id,
        f: impl FnOnce(&mut Cell) -> Result<(), ModelError>,
    ) -> Result<(), ControllerError> {
        let chapter_id = self
            .notebook
            .active_chapter_id()
            .cloned()
            .ok_or_else(|| ModelError::CellNotFound(cell_id.clone()))?;
        self.notebook
            .edit_chapter(&chapter_id, |chapter| match chapter.cell_mut(cell_id) {
                Some(cell) => f(cell),
                None => Err(ModelError::CellNotFound(cell_id.clone())),
            })??;
        Ok(())
    }

    // ============================================================
    // Saving
    // ============================================================

    /// Capture the region and persist the notebook
    pub async fn save(&mut self) -> Result<(), ControllerError> {
        self.checkpoint().await
    }

    /// Best-effort save when the host is going away. Never fails; problems
    /// are logged and queued as notices.
    pub async fn on_unload(&mut self) {
        if let Err(e) = self.capture_active().await {
            tracing::warn!(error = %e, "Capture on unload failed, saving last known state");
        }
        if self.persist().is_ok() {
            tracing::info!(notebook_id = %self.notebook.id(), "Saved on unload");
        }
    }

    /// Autosave tick: like [`Self::on_unload`] but reports storage failures
    pub async fn autosave(&mut self) -> Result<(), StorageError> {
        if let Err(e) = self.capture_active().await {
            tracing::debug!(error = %e, "Autosave capture skipped");
        }
        self.persist()
    }

    async fn checkpoint(&mut self) -> Result<(), ControllerError> {
        self.capture_active().await?;
        self.persist()?;
        Ok(())
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        match self.store.save(&self.notebook) {
            Ok(()) => {
                tracing::debug!(notebook_id = %self.notebook.id(), "Notebook persisted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    notebook_id = %self.notebook.id(),
                    error = %e,
                    "Failed to save notebook"
                );
                let message = if e.is_quota() {
                    format!("Storage is full, notebook not saved: {e}")
                } else {
                    format!("Failed to save notebook: {e}")
                };
                self.notify(NoticeLevel::Error, message);
                Err(e)
            }
        }
    }

    /// Fold the live region into the active chapter
    async fn capture_active(&mut self) -> Result<(), ControllerError> {
        let Some(chapter_id) = self.notebook.active_chapter_id().cloned() else {
            return Ok(());
        };
        let snapshot = capture(&self.region).await?;
        let placeholder = self.region.showing_placeholder();
        let language = self.notebook.settings.default_language.clone();
        self.notebook.edit_chapter(&chapter_id, |chapter| {
            fold_snapshot(chapter, snapshot, placeholder, &language)
        })?;
        Ok(())
    }

    /// Rebuild the region from the active chapter
    async fn render_active(&mut self) -> Result<RestoreReport, ControllerError> {
        let Some(chapter) = self.notebook.active_chapter() else {
            return Ok(RestoreReport::default());
        };

        if chapter.is_empty() && chapter.html().is_none() {
            self.region.show_placeholder(&chapter.title);
            self.last_report = Some(RestoreReport::default());
            return Ok(RestoreReport::default());
        }

        let snapshot = chapter_snapshot(chapter);
        let mut options = self.options.clone();
        if chapter.is_empty() {
            // Cached rendering is all a chapter without cells has
            options.replay_markup = true;
        }
        let chapter_id = chapter.id().clone();

        let report = Restorer::new(Some(&self.widgets), options)
            .restore(&mut self.region, &snapshot)
            .await?;

        if !report.skipped_sections.is_empty() {
            let kinds: Vec<&str> = report
                .skipped_sections
                .iter()
                .map(|s| s.kind.as_str())
                .collect();
            self.notify(
                NoticeLevel::Warning,
                format!(
                    "{} section(s) could not be restored: {}",
                    kinds.len(),
                    kinds.join(", ")
                ),
            );
        }
        tracing::info!(
            chapter_id = %chapter_id,
            sections = report.sections_restored,
            skipped = report.skipped_sections.len(),
            "Chapter restored"
        );
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Start autosaving a shared controller every `interval`
    pub fn spawn_autosave(this: Arc<tokio::sync::Mutex<Self>>, interval: Duration) -> AutoSave
    where
        R: 'static,
    {
        let mut autosave = AutoSave::new(interval);
        autosave.start(this);
        autosave
    }
}

#[async_trait]
impl<R: LiveRegion + 'static> AutosaveTarget for tokio::sync::Mutex<NotebookController<R>> {
    async fn autosave(&self) -> Result<(), StorageError> {
        self.lock().await.autosave().await
    }
}

// ============================================================
// Folding between chapters and region snapshots
// ============================================================

/// Widget kind for a cell. Html cells may carry the kind of a foreign
/// widget under `metadata.widget`.
fn section_kind(cell: &Cell) -> String {
    match (cell.cell_type(), cell.metadata.get("widget").and_then(|w| w.as_str())) {
        (CellType::Html, Some(widget)) => widget.to_string(),
        (cell_type, _) => cell_type.as_str().to_string(),
    }
}

fn default_title(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn section_title(cell: &Cell) -> String {
    cell.metadata
        .get("title")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| default_title(&section_kind(cell)))
}

/// Snapshot that rebuilds a chapter. Cells are canonical: captured source
/// values of cells are dropped so edits made to the model win.
fn chapter_snapshot(chapter: &Chapter) -> RegionSnapshot {
    let sections: Vec<SectionCapture> = chapter
        .cells()
        .iter()
        .map(|cell| SectionCapture {
            id: cell.id().to_string(),
            kind: section_kind(cell),
            title: section_title(cell),
            content: cell.content().to_string(),
            output: cell.output().cloned(),
        })
        .collect();
    let section_ids: HashSet<&str> = sections.iter().map(|s| s.id.as_str()).collect();

    let fields = chapter
        .input_states()
        .iter()
        .filter(|f| {
            let is_cell_source = f.name.as_deref() == Some(SOURCE_CONTROL)
                && f
                    .section_id
                    .as_deref()
                    .is_some_and(|id| section_ids.contains(id));
            !is_cell_source
        })
        .cloned()
        .collect();

    RegionSnapshot {
        markup: chapter.html().map(str::to_string),
        fields,
        artifacts: Vec::new(),
        sections,
    }
}

/// Make `chapter` reflect a capture of its live region.
///
/// Cells follow section order. A section matching a cell id updates that
/// cell; a new section becomes a new cell with that id; cells without a
/// section are dropped. The placeholder folds to an empty chapter.
fn fold_snapshot(
    chapter: &mut Chapter,
    snapshot: RegionSnapshot,
    placeholder: bool,
    default_language: &str,
) {
    if placeholder {
        chapter.replace_cells(Vec::new());
        chapter.set_render_cache(None, Vec::new());
        return;
    }

    let mut existing: HashMap<String, Cell> = chapter
        .cells()
        .iter()
        .map(|cell| (cell.id().to_string(), cell.clone()))
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    let mut cells = Vec::with_capacity(snapshot.sections.len());
    for section in &snapshot.sections {
        let mut cell = match existing.remove(&section.id) {
            Some(cell) => cell,
            // Cell ids stay unique even if the region repeats a section id
            None if section.id.is_empty() || taken.contains(&section.id) => {
                new_cell(Id::generate(), section, default_language)
            }
            None => new_cell(Id::from(section.id.as_str()), section, default_language),
        };
        taken.insert(section.id.clone());
        if cell.content() != section.content {
            cell.set_content(section.content.clone());
            if cell.cell_type() == CellType::Slider {
                if let Ok(config) = serde_json::from_str::<serde_json::Value>(&section.content) {
                    cell.metadata.insert("sliderConfig".to_string(), config);
                }
            }
        }
        if cell.output() != section.output.as_ref() {
            cell.set_output(section.output.clone());
        }
        if !section.title.is_empty() && section.title != section_title(&cell) {
            cell.metadata.insert(
                "title".to_string(),
                serde_json::Value::String(section.title.clone()),
            );
        }
        cells.push(cell);
    }

    if !existing.is_empty() {
        tracing::debug!(dropped = existing.len(), "Cells without a section dropped");
    }
    chapter.replace_cells(cells);
    chapter.set_render_cache(snapshot.markup, snapshot.fields);
}

fn new_cell(id: Id, section: &SectionCapture, default_language: &str) -> Cell {
    let (cell_type, foreign) = match CellType::parse(&section.kind) {
        Some(cell_type) => (cell_type, None),
        None => (CellType::Html, Some(section.kind.clone())),
    };
    let language = if cell_type == CellType::Code {
        default_language
    } else {
        ""
    };
    let mut cell = Cell::with_id(id, cell_type, language, section.content.clone());
    if let Some(kind) = foreign {
        cell.metadata
            .insert("widget".to_string(), serde_json::Value::String(kind));
    }
    cell
}

use std::path::{Path, PathBuf};

use crate::core::services::error::ServiceError;
use crate::core::LivenoteCore;
use crate::data::{FileStore, NotebookSummary};
use crate::export::ExportFormat;
use crate::model::{Chapter, Id, Notebook};

#[derive(Debug, Clone, Default)]
pub struct CreateNotebookParams {
    pub title: String,
    pub description: String,
}

pub struct NotebookService;

impl NotebookService {
    pub fn list_notebooks(core: &LivenoteCore) -> Result<Vec<NotebookSummary>, ServiceError> {
        core.store()
            .list()
            .map_err(|e| ServiceError::Internal(format!("Failed to list notebooks: {}", e)))
    }

    pub fn get_notebook(core: &LivenoteCore, id: &Id) -> Result<Notebook, ServiceError> {
        core.store()
            .load(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Notebook {} not found", id)))
    }

    pub fn create_notebook(
        core: &LivenoteCore,
        params: CreateNotebookParams,
    ) -> Result<Notebook, ServiceError> {
        let title = params.title.trim();
        if title.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Notebook title cannot be empty".to_string(),
            ));
        }

        let notebook = core.new_notebook(title, &params.description);
        core.store().save(&notebook)?;
        tracing::info!(notebook_id = %notebook.id(), "Notebook created");
        Ok(notebook)
    }

    pub fn delete_notebook(core: &LivenoteCore, id: &Id) -> Result<(), ServiceError> {
        let store = core.store();
        if store.load(id)?.is_none() {
            return Err(ServiceError::NotFound(format!("Notebook {} not found", id)));
        }
        store.delete(id)?;
        Ok(())
    }

    /// Append a chapter; an empty title becomes "Chapter N"
    pub fn add_chapter(
        core: &LivenoteCore,
        id: &Id,
        title: &str,
    ) -> Result<Chapter, ServiceError> {
        let mut notebook = Self::get_notebook(core, id)?;
        let title = match title.trim() {
            "" => format!("Chapter {}", notebook.chapters().len() + 1),
            t => t.to_string(),
        };
        let chapter_id = notebook.add_chapter(Chapter::new(title), None);
        core.store().save(&notebook)?;

        notebook
            .chapter(&chapter_id)
            .cloned()
            .ok_or_else(|| ServiceError::Internal("Chapter vanished after insert".to_string()))
    }

    pub fn rename_chapter(
        core: &LivenoteCore,
        id: &Id,
        chapter_id: &Id,
        title: &str,
    ) -> Result<(), ServiceError> {
        let mut notebook = Self::get_notebook(core, id)?;
        notebook.rename_chapter(chapter_id, title.trim())?;
        core.store().save(&notebook)?;
        Ok(())
    }

    /// Remove a chapter. The last remaining chapter cannot be removed.
    pub fn remove_chapter(
        core: &LivenoteCore,
        id: &Id,
        chapter_id: &Id,
    ) -> Result<Chapter, ServiceError> {
        let mut notebook = Self::get_notebook(core, id)?;
        let removed = notebook.remove_chapter(chapter_id)?;
        core.store().save(&notebook)?;
        Ok(removed)
    }

    /// Write a stored notebook to `out`, or to the exports directory under
    /// its default file name. Returns the path written.
    pub fn export_notebook(
        core: &LivenoteCore,
        id: &Id,
        format: ExportFormat,
        out: Option<&Path>,
    ) -> Result<PathBuf, ServiceError> {
        let notebook = Self::get_notebook(core, id)?;
        let path = match out {
            Some(path) => path.to_path_buf(),
            None => crate::util::exports_dir().join(FileStore::default_file_name(&notebook, format)),
        };
        FileStore::export(&notebook, &path, format)
            .map_err(|e| ServiceError::Internal(format!("Failed to export notebook: {}", e)))?;
        Ok(path)
    }

    /// Read a notebook file and store it, replacing any notebook with the
    /// same id
    pub fn import_notebook(core: &LivenoteCore, path: &Path) -> Result<Notebook, ServiceError> {
        let notebook = FileStore::import(path).map_err(|e| match e {
            crate::data::StorageError::Io(io) => {
                ServiceError::NotFound(format!("Cannot read {}: {}", path.display(), io))
            }
            other => other.into(),
        })?;
        core.store().save(&notebook)?;
        Ok(notebook)
    }
}

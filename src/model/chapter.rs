//! Chapter: an ordered group of cells forming one view of a notebook

use serde::{Deserialize, Serialize};

use super::{Cell, Id, Metadata};
use crate::snapshot::FieldCapture;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    id: Id,
    /// Display title
    pub title: String,
    /// Absent in chapters that only carry a cached rendering
    #[serde(default)]
    cells: Vec<Cell>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub metadata: Metadata,
    /// Position within the notebook, kept dense by the notebook
    #[serde(default)]
    pub(crate) order: usize,
    /// Cached markup of the last capture. Not the source of truth: cells are.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) html: Option<String>,
    /// Field values of the last capture, reapplied after the cells are rebuilt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) input_states: Vec<FieldCapture>,
}

impl Chapter {
    /// Create an empty chapter
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_cells(title, Vec::new())
    }

    pub fn with_cells(title: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            id: Id::generate(),
            title: title.into(),
            cells,
            collapsed: false,
            metadata: Metadata::new(),
            order: 0,
            html: None,
            input_states: Vec::new(),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn input_states(&self) -> &[FieldCapture] {
        &self.input_states
    }

    /// Insert a cell at `index` (clamped), or append when `None`
    pub fn add_cell(&mut self, cell: Cell, index: Option<usize>) -> Id {
        let id = cell.id().clone();
        match index {
            Some(i) => {
                let i = i.min(self.cells.len());
                self.cells.insert(i, cell);
            }
            None => self.cells.push(cell),
        }
        id
    }

    pub fn remove_cell(&mut self, cell_id: &Id) -> Option<Cell> {
        let index = self.cells.iter().position(|c| c.id() == cell_id)?;
        Some(self.cells.remove(index))
    }

    /// Move a cell to `new_index` (clamped); returns false if the cell is unknown
    pub fn move_cell(&mut self, cell_id: &Id, new_index: usize) -> bool {
        match self.remove_cell(cell_id) {
            Some(cell) => {
                self.add_cell(cell, Some(new_index));
                true
            }
            None => false,
        }
    }

    pub fn cell(&self, cell_id: &Id) -> Option<&Cell> {
        self.cells.iter().find(|c| c.id() == cell_id)
    }

    pub fn cell_mut(&mut self, cell_id: &Id) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.id() == cell_id)
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Replace the cell list wholesale (capture folding)
    pub(crate) fn replace_cells(&mut self, cells: Vec<Cell>) {
        self.cells = cells;
    }

    pub(crate) fn set_render_cache(&mut self, html: Option<String>, fields: Vec<FieldCapture>) {
        self.html = html;
        self.input_states = fields;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellType;

    fn ids(chapter: &Chapter) -> Vec<Id> {
        chapter.cells().iter().map(|c| c.id().clone()).collect()
    }

    #[test]
    fn test_add_remove_move() {
        let mut chapter = Chapter::new("Intro");
        let a = chapter.add_cell(Cell::new(CellType::Code), None);
        let b = chapter.add_cell(Cell::new(CellType::Markdown), None);
        let c = chapter.add_cell(Cell::new(CellType::Latex), Some(0));
        assert_eq!(ids(&chapter), vec![c.clone(), a.clone(), b.clone()]);
        assert!(chapter.move_cell(&c, 2));
        assert_eq!(ids(&chapter), vec![a.clone(), b.clone(), c.clone()]);

        let removed = chapter.remove_cell(&b).unwrap();
        assert_eq!(removed.id(), &b);
        assert_eq!(ids(&chapter), vec![a, c]);
        assert!(chapter.remove_cell(&b).is_none());
        assert!(!chapter.move_cell(&b, 0));
    }

    #[test]
    fn test_insert_index_clamped() {
        let mut chapter = Chapter::new("x");
        let a = chapter.add_cell(Cell::new(CellType::Code), Some(10));
        assert_eq!(ids(&chapter), vec![a]);
    }

    #[test]
    fn test_render_cache_omitted_when_empty() {
        let chapter = Chapter::new("x");
        let value = serde_json::to_value(&chapter).unwrap();
        assert!(value.get("html").is_none());
        assert!(value.get("inputStates").is_none());
        assert_eq!(value["order"], 0);
    }

    #[test]
    fn test_cache_only_chapter_loads_without_cells() {
        let chapter: Chapter = serde_json::from_value(serde_json::json!({
            "id": "ch_top_1",
            "title": "Imported page",
            "html": "<div class=\"app-section\"><input name=\"rate\" value=\"3\"/></div>",
            "inputStates": [
                {"index": 0, "name": "rate", "kind": "numeric", "value": 3.0}
            ]
        }))
        .unwrap();

        assert!(chapter.is_empty());
        assert_eq!(chapter.id(), "ch_top_1");
        assert!(chapter.html().unwrap().contains("rate"));
        assert_eq!(chapter.input_states().len(), 1);
    }
}

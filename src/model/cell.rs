//! Cell: the smallest addressable unit of notebook content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, Id, Metadata, ModelError};

/// Kind of content a cell holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Latex,
    Slider,
    Image,
    Html,
}

impl CellType {
    pub const ALL: [CellType; 6] = [
        CellType::Code,
        CellType::Markdown,
        CellType::Latex,
        CellType::Slider,
        CellType::Image,
        CellType::Html,
    ];

    /// String representation, also used as the widget kind label
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Latex => "latex",
            CellType::Slider => "slider",
            CellType::Image => "image",
            CellType::Html => "html",
        }
    }

    /// Parse a kind label; unknown labels return `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code" | "python" => Some(CellType::Code),
            "markdown" => Some(CellType::Markdown),
            "latex" => Some(CellType::Latex),
            "slider" => Some(CellType::Slider),
            "image" | "plot" => Some(CellType::Image),
            "html" => Some(CellType::Html),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

impl CellStatus {
    /// Allowed edges: idle -> running -> {success, error} -> idle
    pub fn can_transition_to(self, next: CellStatus) -> bool {
        matches!(
            (self, next),
            (CellStatus::Idle, CellStatus::Running)
                | (CellStatus::Running, CellStatus::Success)
                | (CellStatus::Running, CellStatus::Error)
                | (CellStatus::Success, CellStatus::Idle)
                | (CellStatus::Error, CellStatus::Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Idle => "idle",
            CellStatus::Running => "running",
            CellStatus::Success => "success",
            CellStatus::Error => "error",
        }
    }
}

/// Kind of a computed output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Text,
    Image,
    Html,
    Error,
}

/// Last computed result of a cell (also the shape returned by widgets and
/// the execution service)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputData {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    pub content: String,
}

impl OutputData {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Text,
            content: content.into(),
        }
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Image,
            content: data_uri.into(),
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Html,
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: OutputKind::Error,
            content: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutputKind::Error
    }
}

/// A single notebook cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    id: Id,
    #[serde(rename = "type")]
    cell_type: CellType,
    /// Language tag (e.g. "python", "markdown")
    pub language: String,
    content: String,
    output: Option<OutputData>,
    status: CellStatus,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    updated_at: DateTime<Utc>,
}

impl Cell {
    /// Create an empty cell of the given type
    pub fn new(cell_type: CellType) -> Self {
        let language = match cell_type {
            CellType::Code => "python",
            CellType::Markdown => "markdown",
            CellType::Latex => "latex",
            CellType::Html => "html",
            CellType::Slider | CellType::Image => "",
        };
        Self::with_id(Id::generate(), cell_type, language, "")
    }

    /// Create a cell with a known id (used when folding captured sections
    /// back into a chapter)
    pub(crate) fn with_id(
        id: Id,
        cell_type: CellType,
        language: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            cell_type,
            language: language.into(),
            content: content.into(),
            output: None,
            status: CellStatus::Idle,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn code(content: impl Into<String>, language: impl Into<String>) -> Self {
        let mut cell = Self::new(CellType::Code);
        cell.language = language.into();
        cell.content = content.into();
        cell
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        let mut cell = Self::new(CellType::Markdown);
        cell.content = content.into();
        cell
    }

    pub fn latex(content: impl Into<String>) -> Self {
        let mut cell = Self::new(CellType::Latex);
        cell.content = content.into();
        cell
    }

    /// Slider cell; the config is stored both as content and under
    /// `metadata.sliderConfig`
    pub fn slider(config: serde_json::Value) -> Self {
        let mut cell = Self::new(CellType::Slider);
        cell.content = config.to_string();
        cell.metadata.insert("sliderConfig".to_string(), config);
        cell
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn output(&self) -> Option<&OutputData> {
        self.output.as_ref()
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.touch();
    }

    pub fn set_output(&mut self, output: Option<OutputData>) {
        self.output = output;
        self.touch();
    }

    /// Move to `next` status, rejecting edges outside the lifecycle
    pub fn transition(&mut self, next: CellStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// idle -> running
    pub fn begin_run(&mut self) -> Result<(), ModelError> {
        self.transition(CellStatus::Running)
    }

    /// running -> success/error depending on the output kind
    pub fn finish_run(&mut self, output: OutputData) -> Result<(), ModelError> {
        let next = if output.is_error() {
            CellStatus::Error
        } else {
            CellStatus::Success
        };
        self.transition(next)?;
        self.output = Some(output);
        Ok(())
    }

    /// success/error -> idle
    pub fn reset(&mut self) -> Result<(), ModelError> {
        self.transition(CellStatus::Idle)
    }

    /// In-place access to the output without bumping `updatedAt` (storage
    /// rewrites of asset references)
    pub(crate) fn output_mut(&mut self) -> Option<&mut OutputData> {
        self.output.as_mut()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

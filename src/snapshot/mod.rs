//! Capture and restore of live UI state
//!
//! A [`RegionSnapshot`] is the plain-data form of a [`LiveRegion`]: a markup
//! fallback, every editable control's value, rendered artifacts and the
//! mounted sections. [`capture`] produces one, [`Restorer`] applies one.

mod capture;
mod memory;
mod region;
mod restore;
mod widget;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{OutputData, OutputKind};

pub use capture::capture;
pub use memory::MemoryRegion;
pub use region::{
    ArtifactView, ChangeNotifier, Control, ControlView, LiveRegion, MountedSection, RegionEvent,
    SectionView,
};
pub use restore::{RestoreOptions, RestoreReport, Restorer, SkippedSection};
pub use widget::{
    SectionBuilder, SectionState, WidgetError, WidgetFactory, WidgetHandle, WidgetRegistry,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(String),
    #[error("Target region is not attached")]
    Detached,
}

/// Kind of an editable control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Numeric,
}

/// Value held by a control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value can be written into a control of `kind`
    pub fn fits(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Text(_), FieldKind::Text)
                | (FieldValue::Bool(_), FieldKind::Checkbox)
                | (FieldValue::Number(_), FieldKind::Numeric)
        )
    }
}

/// One editable control's captured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCapture {
    /// Position in traversal order at capture time
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: FieldKind,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Text,
    Html,
}

/// A rendered output found in the region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactCapture {
    /// Enclosing section id, or `"{kind}-{i}"` for the i-th artifact of that
    /// kind when it sits outside any section
    pub target: String,
    pub kind: ArtifactKind,
    pub content: String,
}

/// A mounted section, enough to re-create it through its factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCapture {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub output: Option<OutputData>,
}

/// Plain-data capture of a live region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    #[serde(default)]
    pub markup: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldCapture>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactCapture>,
    #[serde(default)]
    pub sections: Vec<SectionCapture>,
}

impl RegionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.artifacts.is_empty() && self.sections.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Text => "text",
            ArtifactKind::Html => "html",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(ArtifactKind::Image),
            "text" => Some(ArtifactKind::Text),
            "html" => Some(ArtifactKind::Html),
            _ => None,
        }
    }

    /// Target of the `ordinal`-th artifact of this kind, counted over the
    /// whole region in traversal order
    pub fn ordinal_target(&self, ordinal: usize) -> String {
        format!("{}-{ordinal}", self.as_str())
    }

    /// Inverse of [`Self::ordinal_target`]
    pub fn parse_ordinal_target(target: &str) -> Option<(Self, usize)> {
        let (kind, ordinal) = target.rsplit_once('-')?;
        Some((Self::parse(kind)?, ordinal.parse().ok()?))
    }
}

impl From<OutputKind> for ArtifactKind {
    fn from(kind: OutputKind) -> Self {
        match kind {
            OutputKind::Image => ArtifactKind::Image,
            OutputKind::Html => ArtifactKind::Html,
            OutputKind::Text | OutputKind::Error => ArtifactKind::Text,
        }
    }
}

impl From<ArtifactKind> for OutputKind {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Image => OutputKind::Image,
            ArtifactKind::Text => OutputKind::Text,
            ArtifactKind::Html => OutputKind::Html,
        }
    }
}

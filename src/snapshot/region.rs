//! The live region abstraction
//!
//! A [`LiveRegion`] is the host-rendered container a chapter is drawn into.
//! The core never parses markup: it talks to the region through section and
//! control views, and hands opaque markup back to the host when replaying.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::widget::WidgetHandle;
use super::{ArtifactKind, FieldKind, FieldValue};

/// A mounted section as seen by capture
#[derive(Debug, Clone, PartialEq)]
pub struct SectionView {
    pub id: Option<String>,
    pub kind: String,
    pub title: String,
}

/// An editable control, in traversal order
#[derive(Debug, Clone, PartialEq)]
pub struct ControlView {
    /// Position in traversal order
    pub index: usize,
    /// Id of the enclosing section, if any
    pub section_id: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: FieldKind,
    pub value: FieldValue,
}

/// A rendered artifact (image data URI, text output, html panel)
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactView {
    pub section_id: Option<String>,
    pub kind: ArtifactKind,
    pub content: String,
}

/// A control to be mounted inside a section
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: FieldKind,
    pub value: FieldValue,
}

/// Everything needed to mount one section into a region
#[derive(Debug, Clone, PartialEq)]
pub struct MountedSection {
    pub id: Option<String>,
    pub kind: String,
    pub title: String,
    pub controls: Vec<Control>,
    pub artifacts: Vec<(ArtifactKind, String)>,
}

/// Change notifications raised by the region or its widgets
#[derive(Debug, Clone, PartialEq)]
pub enum RegionEvent {
    /// A control value was written (by the user or by hydration)
    ControlChanged {
        index: usize,
        section_id: Option<String>,
        control_id: Option<String>,
    },
    /// A widget recomputed its output
    WidgetChanged { section_id: String },
}

/// Fan-out sender for [`RegionEvent`]s. Clones share the subscriber list, so
/// a notifier handed to a widget keeps reaching subscribers added later.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<RegionEvent>>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RegionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber, dropping closed ones
    pub fn notify(&self, event: RegionEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Host-rendered container for one chapter's live UI
pub trait LiveRegion: Send + Sync {
    /// False once the host has torn the region down
    fn is_attached(&self) -> bool;

    /// Current serialized markup, used only as a fallback cache
    fn markup(&self) -> String;

    /// Install opaque markup. Whatever it contains is inert: no sections or
    /// widgets are live afterwards.
    fn replace_markup(&mut self, markup: &str);

    /// Remove everything from the region
    fn clear(&mut self);

    /// Clear and show the empty-chapter placeholder
    fn show_placeholder(&mut self, title: &str);

    /// True while the placeholder is all the region shows. Mounting or
    /// adding anything ends it.
    fn showing_placeholder(&self) -> bool;

    fn sections(&self) -> Vec<SectionView>;

    fn controls(&self) -> Vec<ControlView>;

    fn artifacts(&self) -> Vec<ArtifactView>;

    /// Widget handle mounted for a section
    fn widget(&self, section_id: &str) -> Option<Arc<dyn WidgetHandle>>;

    /// Write a control value by traversal index; false if there is no such
    /// control or the value does not fit its kind. Raises `ControlChanged`.
    fn set_control(&mut self, index: usize, value: &FieldValue) -> bool;

    /// Show an artifact inside a section, replacing any of the same kind;
    /// false if the section is not mounted
    fn set_artifact(&mut self, section_id: &str, kind: ArtifactKind, content: &str) -> bool;

    /// Replace the content of the `ordinal`-th artifact of `kind`, counted
    /// over the whole region in traversal order; false if there are fewer
    fn set_artifact_at(&mut self, kind: ArtifactKind, ordinal: usize, content: &str) -> bool;

    /// Append a section (and its widget) to the region
    fn mount(&mut self, section: MountedSection, widget: Option<Arc<dyn WidgetHandle>>);

    /// Notifier shared with widgets mounted in this region
    fn notifier(&self) -> ChangeNotifier;
}

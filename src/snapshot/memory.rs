//! In-memory [`LiveRegion`]
//!
//! Holds mounted sections, loose controls and artifacts as plain data and
//! renders them to markup on demand. Used by the CLI and the tests, and as
//! the reference for host implementations.

use std::sync::Arc;

use super::region::{
    ArtifactView, ChangeNotifier, Control, ControlView, LiveRegion, MountedSection, RegionEvent,
    SectionView,
};
use super::widget::WidgetHandle;
use super::{ArtifactKind, FieldKind, FieldValue};
use crate::util::html::escape;

/// Text shown in a chapter with no cells
pub const EMPTY_CHAPTER_TEXT: &str = "This chapter is empty. Add a cell to get started.";

struct SectionNode {
    section: MountedSection,
    widget: Option<Arc<dyn WidgetHandle>>,
}

enum Node {
    Section(SectionNode),
    /// Control outside any section (externally supplied content)
    Control(Control),
    Artifact(ArtifactKind, String),
}

pub struct MemoryRegion {
    attached: bool,
    nodes: Vec<Node>,
    inert_markup: Option<String>,
    placeholder: Option<String>,
    notifier: ChangeNotifier,
}

impl Default for MemoryRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegion {
    pub fn new() -> Self {
        Self {
            attached: true,
            nodes: Vec::new(),
            inert_markup: None,
            placeholder: None,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Simulate the host tearing the region down
    pub fn detach(&mut self) {
        self.attached = false;
    }

    /// Title of the chapter whose placeholder is showing
    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn inert_markup(&self) -> Option<&str> {
        self.inert_markup.as_deref()
    }

    pub fn section(&self, id: &str) -> Option<&MountedSection> {
        self.nodes.iter().find_map(|node| match node {
            Node::Section(n) if n.section.id.as_deref() == Some(id) => Some(&n.section),
            _ => None,
        })
    }

    pub fn section_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Section(_)))
            .count()
    }

    /// Add a control outside any section
    pub fn push_control(&mut self, control: Control) {
        self.placeholder = None;
        self.nodes.push(Node::Control(control));
    }

    /// Add an artifact outside any section
    pub fn push_artifact(&mut self, kind: ArtifactKind, content: impl Into<String>) {
        self.placeholder = None;
        self.nodes.push(Node::Artifact(kind, content.into()));
    }

    /// Value of the control with the given id
    pub fn control_value(&self, control_id: &str) -> Option<FieldValue> {
        self.controls()
            .into_iter()
            .find(|c| c.id.as_deref() == Some(control_id))
            .map(|c| c.value)
    }

    /// Write a control by id, as a user edit would
    pub fn edit(&mut self, control_id: &str, value: FieldValue) -> bool {
        match self
            .controls()
            .into_iter()
            .find(|c| c.id.as_deref() == Some(control_id))
        {
            Some(view) => self.set_control(view.index, &value),
            None => false,
        }
    }

    fn controls_mut(&mut self) -> impl Iterator<Item = (Option<&str>, &mut Control)> {
        self.nodes.iter_mut().flat_map(|node| {
            let items: Vec<(Option<&str>, &mut Control)> = match node {
                Node::Section(n) => {
                    let section_id = n.section.id.as_deref();
                    n.section
                        .controls
                        .iter_mut()
                        .map(|c| (section_id, c))
                        .collect()
                }
                Node::Control(c) => vec![(None, c)],
                Node::Artifact(..) => Vec::new(),
            };
            items
        })
    }

    fn render_control(out: &mut String, control: &Control) {
        let (input_type, value) = match (&control.kind, &control.value) {
            (FieldKind::Checkbox, v) => ("checkbox", v.as_bool().unwrap_or(false).to_string()),
            (FieldKind::Numeric, FieldValue::Number(n)) => ("number", n.to_string()),
            (FieldKind::Text, FieldValue::Text(s)) => {
                out.push_str(&format!(
                    "<textarea{}>{}</textarea>",
                    Self::attrs(control),
                    escape(s)
                ));
                return;
            }
            (_, other) => ("text", format!("{other:?}")),
        };
        out.push_str(&format!(
            "<input type=\"{input_type}\"{} value=\"{}\"/>",
            Self::attrs(control),
            escape(&value)
        ));
    }

    fn attrs(control: &Control) -> String {
        let mut attrs = String::new();
        if let Some(id) = &control.id {
            attrs.push_str(&format!(" id=\"{}\"", escape(id)));
        }
        if let Some(name) = &control.name {
            attrs.push_str(&format!(" name=\"{}\"", escape(name)));
        }
        attrs
    }

    fn render_artifact(out: &mut String, kind: ArtifactKind, content: &str) {
        match kind {
            ArtifactKind::Image => out.push_str(&format!("<img src=\"{}\"/>", escape(content))),
            ArtifactKind::Text => out.push_str(&format!("<pre>{}</pre>", escape(content))),
            ArtifactKind::Html => out.push_str(&format!("<div class=\"output\">{content}</div>")),
        }
    }
}

impl LiveRegion for MemoryRegion {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn markup(&self) -> String {
        if let Some(title) = &self.placeholder {
            return format!(
                "<div class=\"empty-chapter\"><h2>{}</h2><p>{}</p></div>",
                escape(title),
                EMPTY_CHAPTER_TEXT
            );
        }
        let mut out = self.inert_markup.clone().unwrap_or_default();
        for node in &self.nodes {
            match node {
                Node::Section(n) => {
                    let s = &n.section;
                    out.push_str("<section class=\"app-section\"");
                    if let Some(id) = &s.id {
                        out.push_str(&format!(" id=\"{}\"", escape(id)));
                    }
                    out.push_str(&format!(" data-kind=\"{}\">", escape(&s.kind)));
                    out.push_str(&format!("<h3>{}</h3>", escape(&s.title)));
                    for control in &s.controls {
                        Self::render_control(&mut out, control);
                    }
                    for (kind, content) in &s.artifacts {
                        Self::render_artifact(&mut out, *kind, content);
                    }
                    out.push_str("</section>");
                }
                Node::Control(c) => Self::render_control(&mut out, c),
                Node::Artifact(kind, content) => Self::render_artifact(&mut out, *kind, content),
            }
        }
        out
    }

    fn replace_markup(&mut self, markup: &str) {
        self.clear();
        self.inert_markup = Some(markup.to_string());
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.inert_markup = None;
        self.placeholder = None;
    }

    fn show_placeholder(&mut self, title: &str) {
        self.clear();
        self.placeholder = Some(title.to_string());
    }

    fn showing_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    fn sections(&self) -> Vec<SectionView> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Section(n) => Some(SectionView {
                    id: n.section.id.clone(),
                    kind: n.section.kind.clone(),
                    title: n.section.title.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn controls(&self) -> Vec<ControlView> {
        let mut views = Vec::new();
        for node in &self.nodes {
            let (section_id, controls): (Option<&String>, &[Control]) = match node {
                Node::Section(n) => (n.section.id.as_ref(), n.section.controls.as_slice()),
                Node::Control(c) => (None, std::slice::from_ref(c)),
                Node::Artifact(..) => continue,
            };
            for control in controls {
                views.push(ControlView {
                    index: views.len(),
                    section_id: section_id.cloned(),
                    id: control.id.clone(),
                    name: control.name.clone(),
                    kind: control.kind,
                    value: control.value.clone(),
                });
            }
        }
        views
    }

    fn artifacts(&self) -> Vec<ArtifactView> {
        let mut views = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Section(n) => {
                    for (kind, content) in &n.section.artifacts {
                        views.push(ArtifactView {
                            section_id: n.section.id.clone(),
                            kind: *kind,
                            content: content.clone(),
                        });
                    }
                }
                Node::Artifact(kind, content) => views.push(ArtifactView {
                    section_id: None,
                    kind: *kind,
                    content: content.clone(),
                }),
                Node::Control(_) => {}
            }
        }
        views
    }

    fn widget(&self, section_id: &str) -> Option<Arc<dyn WidgetHandle>> {
        self.nodes.iter().find_map(|node| match node {
            Node::Section(n) if n.section.id.as_deref() == Some(section_id) => n.widget.clone(),
            _ => None,
        })
    }

    fn set_control(&mut self, index: usize, value: &FieldValue) -> bool {
        let event = match self.controls_mut().nth(index) {
            Some((section_id, control)) if value.fits(control.kind) => {
                control.value = value.clone();
                RegionEvent::ControlChanged {
                    index,
                    section_id: section_id.map(str::to_string),
                    control_id: control.id.clone(),
                }
            }
            _ => return false,
        };
        self.notifier.notify(event);
        true
    }

    fn set_artifact(&mut self, section_id: &str, kind: ArtifactKind, content: &str) -> bool {
        for node in &mut self.nodes {
            if let Node::Section(n) = node {
                if n.section.id.as_deref() == Some(section_id) {
                    n.section.artifacts.retain(|(k, _)| *k != kind);
                    n.section.artifacts.push((kind, content.to_string()));
                    return true;
                }
            }
        }
        false
    }

    fn set_artifact_at(&mut self, kind: ArtifactKind, ordinal: usize, content: &str) -> bool {
        let slot = self
            .nodes
            .iter_mut()
            .flat_map(|node| {
                let items: Vec<&mut String> = match node {
                    Node::Section(n) => n
                        .section
                        .artifacts
                        .iter_mut()
                        .filter(|(k, _)| *k == kind)
                        .map(|(_, c)| c)
                        .collect(),
                    Node::Artifact(k, c) if *k == kind => vec![c],
                    _ => Vec::new(),
                };
                items
            })
            .nth(ordinal);
        match slot {
            Some(existing) => {
                *existing = content.to_string();
                true
            }
            None => false,
        }
    }

    fn mount(&mut self, section: MountedSection, widget: Option<Arc<dyn WidgetHandle>>) {
        self.placeholder = None;
        self.nodes.push(Node::Section(SectionNode { section, widget }));
    }

    fn notifier(&self) -> ChangeNotifier {
        self.notifier.clone()
    }
}

//! Widget factories and the handles they return
//!
//! A factory knows how to build one kind of section (its controls and
//! artifacts) from a config string. The handle it returns computes the
//! section's output on demand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::region::{ChangeNotifier, Control, ControlView, MountedSection};
use super::{ArtifactKind, FieldKind, FieldValue};
use crate::model::OutputData;

#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Invalid widget config: {0}")]
    Config(String),
    #[error("Widget output failed: {0}")]
    Output(String),
    #[error("No factory registered for kind '{0}'")]
    UnknownKind(String),
}

impl From<serde_json::Error> for WidgetError {
    fn from(err: serde_json::Error) -> Self {
        WidgetError::Config(err.to_string())
    }
}

/// Current control values of one mounted section
#[derive(Debug, Clone)]
pub struct SectionState {
    pub id: String,
    pub controls: Vec<ControlView>,
}

impl SectionState {
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.controls
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| &c.value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(FieldValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(FieldValue::as_number)
    }
}

/// Live handle to a mounted widget
#[async_trait]
pub trait WidgetHandle: Send + Sync {
    /// Output the section currently stands for. `None` means the widget has
    /// nothing of its own and whatever the section displays is kept.
    async fn output_data(&self, state: &SectionState) -> Result<Option<OutputData>, WidgetError>;

    /// Explicit run request (the section's run button). Defaults to
    /// recomputing the output.
    async fn run(&self, state: &SectionState) -> Result<Option<OutputData>, WidgetError> {
        self.output_data(state).await
    }

    /// Content owned by the widget itself rather than a control (e.g. a
    /// slider's parameter config). `None` means the `source` control holds it.
    fn content(&self) -> Option<String> {
        None
    }

    /// Resolves once the widget has finished its own setup
    async fn ready(&self) {}
}

/// Builds one kind of section
#[async_trait]
pub trait WidgetFactory: Send + Sync {
    async fn create(
        &self,
        section: &mut SectionBuilder,
        config: &str,
        notifier: ChangeNotifier,
    ) -> Result<Arc<dyn WidgetHandle>, WidgetError>;
}

/// Accumulates the controls and artifacts of a section being mounted.
/// Control ids are derived from the section id: `"{section}-{name}"`.
#[derive(Debug, Clone)]
pub struct SectionBuilder {
    section: MountedSection,
}

impl SectionBuilder {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            section: MountedSection {
                id: Some(id.into()),
                kind: kind.into(),
                title: title.into(),
                controls: Vec::new(),
                artifacts: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        self.section.id.as_deref().unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        &self.section.kind
    }

    pub fn text(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.control(name, FieldKind::Text, FieldValue::Text(value.into()))
    }

    pub fn checkbox(&mut self, name: &str, checked: bool) -> &mut Self {
        self.control(name, FieldKind::Checkbox, FieldValue::Bool(checked))
    }

    pub fn numeric(&mut self, name: &str, value: f64) -> &mut Self {
        self.control(name, FieldKind::Numeric, FieldValue::Number(value))
    }

    pub fn artifact(&mut self, kind: ArtifactKind, content: impl Into<String>) -> &mut Self {
        self.section.artifacts.retain(|(k, _)| *k != kind);
        self.section.artifacts.push((kind, content.into()));
        self
    }

    pub fn finish(self) -> MountedSection {
        self.section
    }

    fn control(&mut self, name: &str, kind: FieldKind, value: FieldValue) -> &mut Self {
        let id = format!("{}-{}", self.id(), name);
        self.section.controls.push(Control {
            id: Some(id),
            name: Some(name.to_string()),
            kind,
            value,
        });
        self
    }
}

/// Kind label -> factory
#[derive(Default, Clone)]
pub struct WidgetRegistry {
    factories: HashMap<String, Arc<dyn WidgetFactory>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: Arc<dyn WidgetFactory>) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn WidgetFactory>> {
        self.factories.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build and return a section through the factory registered for `kind`
    pub async fn build(
        &self,
        id: &str,
        kind: &str,
        title: &str,
        config: &str,
        notifier: ChangeNotifier,
    ) -> Result<(MountedSection, Arc<dyn WidgetHandle>), WidgetError> {
        let factory = self
            .get(kind)
            .ok_or_else(|| WidgetError::UnknownKind(kind.to_string()))?;
        let mut builder = SectionBuilder::new(id, kind, title);
        let handle = factory.create(&mut builder, config, notifier).await?;
        Ok((builder.finish(), handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl WidgetHandle for Echo {
        async fn output_data(
            &self,
            state: &SectionState,
        ) -> Result<Option<OutputData>, WidgetError> {
            Ok(state.text("source").map(OutputData::text))
        }
    }

    struct EchoFactory;

    #[async_trait]
    impl WidgetFactory for EchoFactory {
        async fn create(
            &self,
            section: &mut SectionBuilder,
            config: &str,
            _notifier: ChangeNotifier,
        ) -> Result<Arc<dyn WidgetHandle>, WidgetError> {
            section.text("source", config).checkbox("live", true);
            Ok(Arc::new(Echo))
        }
    }

    #[tokio::test]
    async fn test_build_derives_control_ids() {
        let mut registry = WidgetRegistry::new();
        registry.register("echo", Arc::new(EchoFactory));

        let (section, _handle) = registry
            .build("s1", "echo", "Echo", "hello", ChangeNotifier::new())
            .await
            .unwrap();
        let ids: Vec<_> = section
            .controls
            .iter()
            .map(|c| c.id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["s1-source", "s1-live"]);
        assert_eq!(section.controls[0].value, FieldValue::Text("hello".into()));
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let registry = WidgetRegistry::new();
        let err = registry
            .build("s1", "plot3d", "", "", ChangeNotifier::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WidgetError::UnknownKind(k) if k == "plot3d"));
    }

    #[test]
    fn test_artifact_replaces_same_kind() {
        let mut builder = SectionBuilder::new("s", "k", "");
        builder
            .artifact(ArtifactKind::Text, "a")
            .artifact(ArtifactKind::Text, "b");
        assert_eq!(
            builder.finish().artifacts,
            vec![(ArtifactKind::Text, "b".to_string())]
        );
    }
}

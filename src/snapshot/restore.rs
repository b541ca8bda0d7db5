//! Apply a [`RegionSnapshot`] to a live region
//!
//! Restoration runs in fixed phases: optional markup replay, structural
//! rebuild through the widget registry, a bounded wait for widget
//! readiness, field hydration, then artifact reapplication. Each phase
//! works on whatever the previous ones left; a failing item is recorded in
//! the report and the rest continue.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::region::{ControlView, LiveRegion};
use super::widget::{WidgetHandle, WidgetRegistry};
use super::{ArtifactKind, FieldCapture, RegionSnapshot, SnapshotError};

/// Default bound on the readiness wait
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Install the captured markup before rebuilding. Off by default: the
    /// rebuilt sections are authoritative and markup is only a fallback.
    pub replay_markup: bool,
    /// Upper bound on waiting for rebuilt widgets to become ready
    pub readiness_timeout: Duration,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            replay_markup: false,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }
}

/// A section that could not be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSection {
    pub id: String,
    pub kind: String,
    pub reason: String,
}

/// What a restore actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub markup_replayed: bool,
    pub sections_restored: usize,
    pub skipped_sections: Vec<SkippedSection>,
    pub fields_applied: usize,
    /// Captured fields with no matching control
    pub fields_skipped: usize,
    pub artifacts_applied: usize,
    pub artifacts_skipped: usize,
    /// The readiness wait hit its timeout
    pub readiness_timed_out: bool,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_sections.is_empty()
            && self.fields_skipped == 0
            && self.artifacts_skipped == 0
            && !self.readiness_timed_out
    }
}

pub struct Restorer<'a> {
    registry: Option<&'a WidgetRegistry>,
    options: RestoreOptions,
}

impl<'a> Restorer<'a> {
    pub fn new(registry: Option<&'a WidgetRegistry>, options: RestoreOptions) -> Self {
        Self { registry, options }
    }

    pub async fn restore(
        &self,
        region: &mut dyn LiveRegion,
        snapshot: &RegionSnapshot,
    ) -> Result<RestoreReport, SnapshotError> {
        if !region.is_attached() {
            return Err(SnapshotError::Detached);
        }
        let mut report = RestoreReport::default();

        // Markup
        if self.options.replay_markup {
            if let Some(markup) = &snapshot.markup {
                region.replace_markup(markup);
                report.markup_replayed = true;
            }
        } else if self.registry.is_some() && !snapshot.sections.is_empty() {
            region.clear();
        }

        // Structure
        let mut handles: Vec<Arc<dyn WidgetHandle>> = Vec::new();
        if let Some(registry) = self.registry {
            for section in &snapshot.sections {
                let built = registry
                    .build(
                        &section.id,
                        &section.kind,
                        &section.title,
                        &section.content,
                        region.notifier(),
                    )
                    .await;
                match built {
                    Ok((mut mounted, handle)) => {
                        if let Some(output) = &section.output {
                            let kind = ArtifactKind::from(output.kind);
                            mounted.artifacts.retain(|(k, _)| *k != kind);
                            mounted.artifacts.push((kind, output.content.clone()));
                        }
                        region.mount(mounted, Some(handle.clone()));
                        handles.push(handle);
                        report.sections_restored += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            section = %section.id,
                            kind = %section.kind,
                            error = %e,
                            "Skipping section during restore"
                        );
                        report.skipped_sections.push(SkippedSection {
                            id: section.id.clone(),
                            kind: section.kind.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        } else if !snapshot.sections.is_empty() {
            tracing::debug!(
                sections = snapshot.sections.len(),
                "No widget registry, structural rebuild skipped"
            );
        }

        // Readiness
        if !handles.is_empty() {
            let wait = join_all(handles.iter().map(|h| h.ready()));
            if tokio::time::timeout(self.options.readiness_timeout, wait)
                .await
                .is_err()
            {
                tracing::warn!(
                    timeout_ms = self.options.readiness_timeout.as_millis() as u64,
                    "Widgets not ready before timeout, hydrating anyway"
                );
                report.readiness_timed_out = true;
            }
        }

        // Fields
        let controls = region.controls();
        for field in &snapshot.fields {
            let applied = locate_control(&controls, field)
                .map(|index| region.set_control(index, &field.value))
                .unwrap_or(false);
            if applied {
                report.fields_applied += 1;
            } else {
                report.fields_skipped += 1;
            }
        }

        // Artifacts
        for artifact in &snapshot.artifacts {
            let applied = region.set_artifact(&artifact.target, artifact.kind, &artifact.content)
                || ArtifactKind::parse_ordinal_target(&artifact.target)
                    .filter(|(kind, _)| *kind == artifact.kind)
                    .is_some_and(|(kind, ordinal)| {
                        region.set_artifact_at(kind, ordinal, &artifact.content)
                    });
            if applied {
                report.artifacts_applied += 1;
            } else {
                report.artifacts_skipped += 1;
            }
        }

        tracing::debug!(
            sections = report.sections_restored,
            skipped = report.skipped_sections.len(),
            fields = report.fields_applied,
            fields_skipped = report.fields_skipped,
            artifacts = report.artifacts_applied,
            "Restored region"
        );
        Ok(report)
    }
}

/// Find the control a captured field belongs to.
///
/// A field with an id matches only by id. Without an id it matches by name
/// within the same section and kind. Without either it falls back to its
/// traversal position, provided the kind agrees.
pub(crate) fn locate_control(controls: &[ControlView], field: &FieldCapture) -> Option<usize> {
    if let Some(id) = &field.id {
        return controls
            .iter()
            .find(|c| c.id.as_ref() == Some(id))
            .map(|c| c.index);
    }
    if let Some(name) = &field.name {
        return controls
            .iter()
            .find(|c| {
                c.name.as_ref() == Some(name)
                    && c.section_id == field.section_id
                    && c.kind == field.kind
            })
            .map(|c| c.index);
    }
    controls
        .get(field.index)
        .filter(|c| c.kind == field.kind)
        .map(|c| c.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutputData;
    use crate::snapshot::{
        capture, ArtifactCapture, ChangeNotifier, Control, FieldKind, FieldValue, MemoryRegion,
        SectionBuilder, SectionCapture, SectionState, WidgetError, WidgetFactory,
    };
    use async_trait::async_trait;

    struct SourceWidget;

    #[async_trait]
    impl WidgetHandle for SourceWidget {
        async fn output_data(
            &self,
            state: &SectionState,
        ) -> Result<Option<OutputData>, WidgetError> {
            Ok(state.text("source").map(|s| OutputData::text(s.len().to_string())))
        }
    }

    struct SourceFactory;

    #[async_trait]
    impl WidgetFactory for SourceFactory {
        async fn create(
            &self,
            section: &mut SectionBuilder,
            config: &str,
            _notifier: ChangeNotifier,
        ) -> Result<Arc<dyn WidgetHandle>, WidgetError> {
            section.text("source", config).checkbox("pinned", false);
            Ok(Arc::new(SourceWidget))
        }
    }

    struct SlowWidget;

    #[async_trait]
    impl WidgetHandle for SlowWidget {
        async fn output_data(&self, _: &SectionState) -> Result<Option<OutputData>, WidgetError> {
            Ok(None)
        }

        async fn ready(&self) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    struct SlowFactory;

    #[async_trait]
    impl WidgetFactory for SlowFactory {
        async fn create(
            &self,
            section: &mut SectionBuilder,
            _config: &str,
            _notifier: ChangeNotifier,
        ) -> Result<Arc<dyn WidgetHandle>, WidgetError> {
            section.numeric("n", 0.0);
            Ok(Arc::new(SlowWidget))
        }
    }

    fn registry() -> WidgetRegistry {
        let mut registry = WidgetRegistry::new();
        registry.register("source", Arc::new(SourceFactory));
        registry.register("slow", Arc::new(SlowFactory));
        registry
    }

    async fn populated(registry: &WidgetRegistry) -> MemoryRegion {
        let mut region = MemoryRegion::new();
        for (id, content) in [("s1", "a = 1"), ("s2", "b = 22")] {
            let (section, handle) = registry
                .build(id, "source", id, content, region.notifier())
                .await
                .unwrap();
            region.mount(section, Some(handle));
        }
        region
    }

    #[tokio::test]
    async fn test_capture_restore_round_trip() {
        let registry = registry();
        let mut original = populated(&registry).await;
        original.edit("s2-pinned", FieldValue::Bool(true));
        original.set_artifact("s1", ArtifactKind::Image, "data:image/png;base64,AA");
        let snapshot = capture(&original).await.unwrap();

        let mut target = MemoryRegion::new();
        let report = Restorer::new(Some(&registry), RestoreOptions::default())
            .restore(&mut target, &snapshot)
            .await
            .unwrap();

        assert!(report.is_complete(), "{report:?}");
        assert_eq!(report.sections_restored, 2);
        assert_eq!(report.fields_applied, 4);
        assert_eq!(
            target.control_value("s2-pinned"),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(capture(&target).await.unwrap().fields, snapshot.fields);
        assert_eq!(capture(&target).await.unwrap().sections, snapshot.sections);
    }

    #[tokio::test]
    async fn test_unknown_kind_skipped_others_continue() {
        let registry = registry();
        let snapshot = RegionSnapshot {
            sections: vec![
                SectionCapture {
                    id: "x".into(),
                    kind: "plot3d".into(),
                    title: "3D".into(),
                    content: String::new(),
                    output: None,
                },
                SectionCapture {
                    id: "y".into(),
                    kind: "source".into(),
                    title: "Y".into(),
                    content: "c".into(),
                    output: Some(OutputData::text("1")),
                },
            ],
            ..Default::default()
        };
        let mut region = MemoryRegion::new();
        let report = Restorer::new(Some(&registry), RestoreOptions::default())
            .restore(&mut region, &snapshot)
            .await
            .unwrap();

        assert_eq!(report.sections_restored, 1);
        assert_eq!(report.skipped_sections.len(), 1);
        assert_eq!(report.skipped_sections[0].kind, "plot3d");
        let mounted = region.section("y").unwrap();
        assert_eq!(mounted.artifacts, vec![(ArtifactKind::Text, "1".into())]);
    }

    #[tokio::test]
    async fn test_readiness_timeout_still_hydrates() {
        let registry = registry();
        let snapshot = RegionSnapshot {
            fields: vec![FieldCapture {
                index: 0,
                section_id: Some("z".into()),
                id: Some("z-n".into()),
                name: Some("n".into()),
                kind: FieldKind::Numeric,
                value: FieldValue::Number(7.0),
            }],
            sections: vec![SectionCapture {
                id: "z".into(),
                kind: "slow".into(),
                title: String::new(),
                content: String::new(),
                output: None,
            }],
            ..Default::default()
        };
        let mut region = MemoryRegion::new();
        let options = RestoreOptions {
            readiness_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let report = Restorer::new(Some(&registry), options)
            .restore(&mut region, &snapshot)
            .await
            .unwrap();

        assert!(report.readiness_timed_out);
        assert_eq!(region.control_value("z-n"), Some(FieldValue::Number(7.0)));
    }

    #[tokio::test]
    async fn test_loose_artifact_restored_by_ordinal() {
        let mut original = MemoryRegion::new();
        original.push_artifact(ArtifactKind::Image, "data:image/png;base64,OLD0");
        original.push_artifact(ArtifactKind::Image, "data:image/png;base64,OLD1");
        let mut snapshot = capture(&original).await.unwrap();
        snapshot.artifacts[1].content = "data:image/png;base64,NEW1".to_string();
        snapshot.artifacts.push(ArtifactCapture {
            target: "image-7".to_string(),
            kind: ArtifactKind::Image,
            content: "missing".to_string(),
        });

        let report = Restorer::new(None, RestoreOptions::default())
            .restore(&mut original, &snapshot)
            .await
            .unwrap();

        assert_eq!(report.artifacts_applied, 2);
        assert_eq!(report.artifacts_skipped, 1);
        assert_eq!(
            original.artifacts()[1].content,
            "data:image/png;base64,NEW1"
        );
    }

    #[tokio::test]
    async fn test_markup_only_restore() {
        let snapshot = RegionSnapshot {
            markup: Some("<p>legacy</p>".into()),
            ..Default::default()
        };
        let mut region = MemoryRegion::new();
        let options = RestoreOptions {
            replay_markup: true,
            ..Default::default()
        };
        let report = Restorer::new(None, options)
            .restore(&mut region, &snapshot)
            .await
            .unwrap();
        assert!(report.markup_replayed);
        assert_eq!(region.inert_markup(), Some("<p>legacy</p>"));
    }

    #[tokio::test]
    async fn test_detached_region_rejected() {
        let mut region = MemoryRegion::new();
        region.detach();
        let err = Restorer::new(None, RestoreOptions::default())
            .restore(&mut region, &RegionSnapshot::default())
            .await
            .unwrap_err();
        assert_eq!(err, SnapshotError::Detached);
    }

    #[test]
    fn test_locate_prefers_id_then_name_then_position() {
        let controls = vec![
            ControlView {
                index: 0,
                section_id: Some("s".into()),
                id: Some("s-a".into()),
                name: Some("a".into()),
                kind: FieldKind::Text,
                value: FieldValue::Text(String::new()),
            },
            ControlView {
                index: 1,
                section_id: Some("s".into()),
                id: None,
                name: Some("b".into()),
                kind: FieldKind::Checkbox,
                value: FieldValue::Bool(false),
            },
        ];
        let mut field = FieldCapture {
            index: 1,
            section_id: Some("s".into()),
            id: Some("s-a".into()),
            name: Some("b".into()),
            kind: FieldKind::Text,
            value: FieldValue::Text("v".into()),
        };
        assert_eq!(locate_control(&controls, &field), Some(0));

        field.id = Some("gone".into());
        assert_eq!(locate_control(&controls, &field), None);

        field.id = None;
        field.kind = FieldKind::Checkbox;
        assert_eq!(locate_control(&controls, &field), Some(1));

        field.name = None;
        field.index = 0;
        assert_eq!(locate_control(&controls, &field), None);
        field.kind = FieldKind::Text;
        assert_eq!(locate_control(&controls, &field), Some(0));
    }

    #[tokio::test]
    async fn test_positional_fallback_for_loose_controls() {
        let mut region = MemoryRegion::new();
        region.push_control(Control {
            id: None,
            name: None,
            kind: FieldKind::Text,
            value: FieldValue::Text("typed".into()),
        });
        let snapshot = capture(&region).await.unwrap();

        let mut fresh = MemoryRegion::new();
        fresh.push_control(Control {
            id: None,
            name: None,
            kind: FieldKind::Text,
            value: FieldValue::Text(String::new()),
        });
        let report = Restorer::new(None, RestoreOptions::default())
            .restore(&mut fresh, &snapshot)
            .await
            .unwrap();
        assert_eq!(report.fields_applied, 1);
        assert_eq!(
            fresh.controls()[0].value,
            FieldValue::Text("typed".into())
        );
    }
}

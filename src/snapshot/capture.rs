//! Capture a live region into a [`RegionSnapshot`]

use std::collections::HashMap;

use super::region::{ArtifactView, ControlView, LiveRegion};
use super::widget::SectionState;
use super::{
    ArtifactCapture, ArtifactKind, FieldCapture, FieldKind, RegionSnapshot, SectionCapture, SnapshotError,
};
use crate::model::{OutputData, OutputKind};

/// Capture every editable control, rendered artifact and mounted section.
///
/// Capturing does not modify the region. Two captures with no user change in
/// between compare equal.
pub async fn capture(region: &dyn LiveRegion) -> Result<RegionSnapshot, SnapshotError> {
    if !region.is_attached() {
        return Err(SnapshotError::Detached);
    }

    let markup = region.markup();
    let controls = region.controls();
    let artifacts = region.artifacts();

    let fields = controls
        .iter()
        .map(|c| FieldCapture {
            index: c.index,
            section_id: c.section_id.clone(),
            id: c.id.clone(),
            name: c.name.clone(),
            kind: c.kind,
            value: c.value.clone(),
        })
        .collect();

    let mut ordinals: HashMap<ArtifactKind, usize> = HashMap::new();
    let artifact_captures = artifacts
        .iter()
        .map(|a| {
            let ordinal = ordinals.entry(a.kind).or_default();
            let target = match &a.section_id {
                Some(id) => id.clone(),
                None => a.kind.ordinal_target(*ordinal),
            };
            *ordinal += 1;
            ArtifactCapture {
                target,
                kind: a.kind,
                content: a.content.clone(),
            }
        })
        .collect();

    let mut sections = Vec::new();
    for view in region.sections() {
        let Some(id) = view.id else {
            tracing::debug!(kind = %view.kind, "Skipping section without id");
            continue;
        };
        let state = SectionState {
            id: id.clone(),
            controls: controls
                .iter()
                .filter(|c| c.section_id.as_deref() == Some(id.as_str()))
                .cloned()
                .collect(),
        };
        let widget = region.widget(&id);

        let content = widget
            .as_ref()
            .and_then(|w| w.content())
            .unwrap_or_else(|| section_source(&state.controls));

        let output = match &widget {
            Some(w) => match w.output_data(&state).await {
                Ok(Some(output)) => Some(output),
                Ok(None) => artifact_output(&artifacts, &id),
                Err(e) => {
                    tracing::warn!(section = %id, error = %e, "Widget output failed, using rendered artifact");
                    artifact_output(&artifacts, &id)
                }
            },
            None => artifact_output(&artifacts, &id),
        };

        sections.push(SectionCapture {
            id,
            kind: view.kind,
            title: view.title,
            content,
            output,
        });
    }

    tracing::debug!(
        fields = controls.len(),
        artifacts = artifacts.len(),
        sections = sections.len(),
        "Captured region"
    );

    Ok(RegionSnapshot {
        markup: (!markup.is_empty()).then_some(markup),
        fields,
        artifacts: artifact_captures,
        sections,
    })
}

/// Value of the `source` control, else the first text control
fn section_source(controls: &[ControlView]) -> String {
    controls
        .iter()
        .find(|c| c.name.as_deref() == Some("source"))
        .or_else(|| controls.iter().find(|c| c.kind == FieldKind::Text))
        .and_then(|c| c.value.as_text())
        .unwrap_or_default()
        .to_string()
}

/// Output recovered from what the section currently displays
fn artifact_output(artifacts: &[ArtifactView], section_id: &str) -> Option<OutputData> {
    artifacts
        .iter()
        .find(|a| a.section_id.as_deref() == Some(section_id))
        .map(|a| OutputData {
            kind: OutputKind::from(a.kind),
            content: a.content.clone(),
        })
}

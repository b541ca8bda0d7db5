//! Text editor section: one `source` control plus a run action

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::export::render_markdown;
use crate::model::{CellType, OutputData};
use crate::runtime::{execution_service, ResourceRegistry};
use crate::snapshot::{
    ChangeNotifier, SectionBuilder, SectionState, WidgetError, WidgetFactory, WidgetHandle,
};

pub struct EditorWidgetFactory {
    resources: Arc<ResourceRegistry>,
}

impl EditorWidgetFactory {
    pub fn new(resources: Arc<ResourceRegistry>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl WidgetFactory for EditorWidgetFactory {
    async fn create(
        &self,
        section: &mut SectionBuilder,
        config: &str,
        _notifier: ChangeNotifier,
    ) -> Result<Arc<dyn WidgetHandle>, WidgetError> {
        let kind = CellType::parse(section.kind())
            .filter(|kind| *kind != CellType::Slider)
            .ok_or_else(|| WidgetError::UnknownKind(section.kind().to_string()))?;
        section.text("source", config);
        Ok(Arc::new(EditorHandle {
            kind,
            resources: self.resources.clone(),
            last_output: Mutex::new(None),
        }))
    }
}

struct EditorHandle {
    kind: CellType,
    resources: Arc<ResourceRegistry>,
    /// Result of the last explicit run (code only)
    last_output: Mutex<Option<OutputData>>,
}

#[async_trait]
impl WidgetHandle for EditorHandle {
    async fn output_data(&self, _state: &SectionState) -> Result<Option<OutputData>, WidgetError> {
        match self.kind {
            CellType::Code => Ok(self.last_output.lock().clone()),
            _ => Ok(None),
        }
    }

    async fn run(&self, state: &SectionState) -> Result<Option<OutputData>, WidgetError> {
        let source = state.text("source").unwrap_or_default();
        let output = match self.kind {
            CellType::Code => {
                let service = execution_service(&self.resources).ok_or_else(|| {
                    WidgetError::Output("no execution service is configured".to_string())
                })?;
                let output = service.execute(source).await;
                *self.last_output.lock() = Some(output.clone());
                Some(output)
            }
            CellType::Markdown => Some(OutputData::html(render_markdown(source))),
            CellType::Html => Some(OutputData::html(source)),
            CellType::Image if source.starts_with("data:image/") => {
                Some(OutputData::image(source))
            }
            _ => None,
        };
        Ok(output)
    }
}

//! Built-in section widgets

mod editor;
mod slider;

use std::sync::Arc;

pub use editor::EditorWidgetFactory;
pub use slider::{SliderConfig, SliderParam, SliderWidgetFactory};

use crate::model::CellType;
use crate::runtime::ResourceRegistry;
use crate::snapshot::WidgetRegistry;

/// Registry with a factory for every cell type
pub fn default_registry(resources: Arc<ResourceRegistry>) -> WidgetRegistry {
    let mut registry = WidgetRegistry::new();
    let editor = Arc::new(EditorWidgetFactory::new(resources.clone()));
    for kind in CellType::ALL {
        if kind == CellType::Slider {
            registry.register(kind.as_str(), Arc::new(SliderWidgetFactory::new(resources.clone())));
        } else {
            registry.register(kind.as_str(), editor.clone());
        }
    }
    registry
}

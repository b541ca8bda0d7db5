//! Parameter slider section
//!
//! Config: `{ "params": { name: { min, max, step, default, label } }, "script": "..." }`.
//! Each parameter becomes a numeric control. When a script is given, the
//! output is the script run with the parameters bound as variables.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::OutputData;
use crate::runtime::{execution_service, ResourceRegistry};
use crate::snapshot::{
    ChangeNotifier, SectionBuilder, SectionState, WidgetError, WidgetFactory, WidgetHandle,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderParam {
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    pub default: f64,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_step() -> f64 {
    1.0
}

impl SliderParam {
    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliderConfig {
    #[serde(default)]
    pub params: BTreeMap<String, SliderParam>,
    #[serde(default)]
    pub script: Option<String>,
}

impl SliderConfig {
    /// Parse and validate. An empty string is a slider with no parameters.
    pub fn parse(raw: &str) -> Result<Self, WidgetError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SliderConfig = serde_json::from_str(raw)?;
        for (name, param) in &config.params {
            if !(param.min <= param.max) {
                return Err(WidgetError::Config(format!(
                    "parameter '{name}' has min {} above max {}",
                    param.min, param.max
                )));
            }
        }
        Ok(config)
    }

    /// Script prefixed with one assignment per parameter
    fn program(&self, state: &SectionState) -> Option<String> {
        let script = self.script.as_deref()?;
        let mut program = String::new();
        for (name, param) in &self.params {
            let value = param.clamp(state.number(name).unwrap_or(param.default));
            program.push_str(&format!("{name} = {value}\n"));
        }
        program.push_str(script);
        Some(program)
    }
}

pub struct SliderWidgetFactory {
    resources: Arc<ResourceRegistry>,
}

impl SliderWidgetFactory {
    pub fn new(resources: Arc<ResourceRegistry>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl WidgetFactory for SliderWidgetFactory {
    async fn create(
        &self,
        section: &mut SectionBuilder,
        config: &str,
        _notifier: ChangeNotifier,
    ) -> Result<Arc<dyn WidgetHandle>, WidgetError> {
        let parsed = SliderConfig::parse(config)?;
        for (name, param) in &parsed.params {
            section.numeric(name, param.clamp(param.default));
        }
        Ok(Arc::new(SliderHandle {
            raw: config.to_string(),
            config: parsed,
            resources: self.resources.clone(),
            cache: Mutex::new(None),
        }))
    }
}

struct SliderHandle {
    raw: String,
    config: SliderConfig,
    resources: Arc<ResourceRegistry>,
    /// Last program run and its output
    cache: Mutex<Option<(String, OutputData)>>,
}

#[async_trait]
impl WidgetHandle for SliderHandle {
    async fn output_data(&self, state: &SectionState) -> Result<Option<OutputData>, WidgetError> {
        let Some(program) = self.config.program(state) else {
            return Ok(None);
        };
        if let Some((cached, output)) = self.cache.lock().as_ref() {
            if *cached == program {
                return Ok(Some(output.clone()));
            }
        }
        let service = execution_service(&self.resources)
            .ok_or_else(|| WidgetError::Output("no execution service is configured".to_string()))?;
        let output = service.execute(&program).await;
        *self.cache.lock() = Some((program, output.clone()));
        Ok(Some(output))
    }

    fn content(&self) -> Option<String> {
        Some(self.raw.clone())
    }
}

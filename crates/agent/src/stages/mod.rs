//! The four generative stage contracts. Each stage builds its instructions,
//! invokes the generative client, coerces the answer and validates it
//! against a fixed schema before anything downstream sees it.

pub mod documenter;
pub mod product_selector;
pub mod recollector;
pub mod risk_profiler;

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::coercion::{coerce, StructuredRecord};
use crate::llm::{GenerationError, GenerationRequest, GenerativeClient};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Intake,
    Recollector,
    RiskProfiler,
    Budget,
    Catalog,
    ProductSelector,
    Documenter,
    Rendering,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Recollector => "recollector",
            Self::RiskProfiler => "risk_profiler",
            Self::Budget => "budget",
            Self::Catalog => "catalog",
            Self::ProductSelector => "product_selector",
            Self::Documenter => "documenter",
            Self::Rendering => "rendering",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("generative call failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("output could not be parsed as a structured record")]
    Unparsable,
    #[error("schema violation: {0}")]
    Schema(String),
    #[error("output changed values it must echo: {}", .paths.join(", "))]
    EchoDrift { paths: Vec<String> },
}

impl StageError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation_failed",
            Self::Unparsable => "unparsable_output",
            Self::Schema(_) => "schema_violation",
            Self::EchoDrift { .. } => "documenter_drift",
        }
    }
}

/// Generation parameters shared by all stages.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageSettings {
    pub temperature: f32,
    pub selector_temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self { temperature: 0.2, selector_temperature: 0.5, max_output_tokens: 65_536 }
    }
}

/// Per-run handle passed to every stage.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub correlation_id: &'a str,
    pub client: &'a dyn GenerativeClient,
    pub settings: StageSettings,
}

impl StageContext<'_> {
    /// Invokes the client and coerces the answer. An empty record is an
    /// [`StageError::Unparsable`] failure.
    pub async fn invoke_structured(
        &self,
        stage: PipelineStage,
        system_instruction: &str,
        user_instruction: String,
        temperature: f32,
    ) -> Result<StructuredRecord, StageError> {
        let request = GenerationRequest {
            label: stage.as_str().to_string(),
            system_instruction: system_instruction.to_string(),
            user_instruction,
            temperature,
            max_output_tokens: self.settings.max_output_tokens,
            structured: true,
        };

        info!(
            event_name = "pipeline.generation.requested",
            correlation_id = self.correlation_id,
            stage = stage.as_str(),
            backend = self.client.name(),
            "invoking generative stage"
        );
        let raw = self.client.invoke(&request).await?;
        let record = coerce(&raw);
        if record.is_empty() {
            warn!(
                event_name = "pipeline.generation.unparsable",
                correlation_id = self.correlation_id,
                stage = stage.as_str(),
                "stage produced no usable output"
            );
            return Err(StageError::Unparsable);
        }
        Ok(record)
    }
}

pub(crate) fn required<'a>(record: &'a StructuredRecord, key: &str) -> Result<&'a Value, StageError> {
    record.get(key).ok_or_else(|| StageError::Schema(format!("missing key `{key}`")))
}

pub(crate) fn required_string(record: &StructuredRecord, key: &str) -> Result<String, StageError> {
    match required(record, key)? {
        Value::String(text) => Ok(text.trim().to_string()),
        other => Err(StageError::Schema(format!(
            "`{key}` must be a string, found {}",
            json_type(other)
        ))),
    }
}

pub(crate) fn required_array<'a>(
    record: &'a StructuredRecord,
    key: &str,
) -> Result<&'a Vec<Value>, StageError> {
    match required(record, key)? {
        Value::Array(items) => Ok(items),
        other => Err(StageError::Schema(format!(
            "`{key}` must be a list, found {}",
            json_type(other)
        ))),
    }
}

pub(crate) fn string_list(values: &[Value], key: &str) -> Result<Vec<String>, StageError> {
    values
        .iter()
        .map(|value| match value {
            Value::String(text) => Ok(text.trim().to_string()),
            other => Err(StageError::Schema(format!(
                "`{key}` must contain only strings, found {}",
                json_type(other)
            ))),
        })
        .collect()
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{required_array, required_string, string_list, StageError};
    use crate::llm::GenerationError;

    #[test]
    fn schema_helpers_report_missing_and_mistyped_keys() {
        let record = json!({ "texto": "hola", "lista": ["a", 2], "numero": 3 })
            .as_object()
            .cloned()
            .expect("object");

        assert_eq!(required_string(&record, "texto"), Ok("hola".to_string()));
        assert!(matches!(required_string(&record, "falta"), Err(StageError::Schema(_))));
        assert!(matches!(required_string(&record, "numero"), Err(StageError::Schema(_))));

        let list = required_array(&record, "lista").expect("list");
        assert!(matches!(string_list(list, "lista"), Err(StageError::Schema(_))));
    }

    #[test]
    fn reasons_are_stable() {
        assert_eq!(StageError::Unparsable.reason(), "unparsable_output");
        assert_eq!(StageError::EchoDrift { paths: vec![] }.reason(), "documenter_drift");
        assert_eq!(
            StageError::from(GenerationError::RateLimited).reason(),
            "generation_failed"
        );
    }
}

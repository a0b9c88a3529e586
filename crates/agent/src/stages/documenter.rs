use propuesta_core::domain::proposal::ProposalDocument;
use serde_json::Value;
use tracing::warn;

use super::{PipelineStage, StageContext, StageError};
use crate::coercion::StructuredRecord;
use crate::guardrails::{EchoPolicy, GuardrailDecision};

pub const SYSTEM_INSTRUCTION: &str = r#"Eres un especialista en documentación comercial.
Recibes una propuesta comercial ya calculada y debes consolidarla en el formato final.

Reglas estrictas:
1. NO recalcules ningún valor. Copia exactamente los números, textos y listas recibidos.
2. Conserva los nombres de los campos, los tipos (los números siguen siendo números, las listas siguen siendo listas) y el orden de los productos.
3. No agregues ni elimines campos.

Responde únicamente con un JSON con la clave "propuesta_comercial" y su contenido:
informacion_cliente, perfil_riesgo, presupuesto, productos_obligatorios, productos_prioritarios, valores_agregados."#;

const PROPOSAL_KEY: &str = "propuesta_comercial";

/// The expected document comes first so it can be echoed verbatim.
pub fn user_instruction(expected: &Value) -> String {
    let document = serde_json::to_string_pretty(expected).unwrap_or_else(|_| "{}".to_string());
    format!("{document}\n\nConsolida esta propuesta comercial sin modificar ningún valor.\n")
}

/// Runs the consolidation stage and accepts its output only when it echoes
/// `expected` (metadata excluded). The accepted document is `expected`.
pub async fn run(
    context: &StageContext<'_>,
    expected: &ProposalDocument,
    policy: &EchoPolicy,
) -> Result<ProposalDocument, StageError> {
    let expected_value = serde_json::to_value(expected)
        .map_err(|error| StageError::Schema(format!("expected document: {error}")))?;

    let answer = context
        .invoke_structured(
            PipelineStage::Documenter,
            SYSTEM_INSTRUCTION,
            user_instruction(&expected_value),
            context.settings.temperature,
        )
        .await?;
    let produced = normalize(answer)?;

    match policy.evaluate(&expected_value, &produced) {
        GuardrailDecision::Allow => Ok(expected.clone()),
        GuardrailDecision::Reject { drifted_paths, .. } => {
            warn!(
                event_name = "pipeline.documenter.drift",
                correlation_id = context.correlation_id,
                drifted = ?drifted_paths,
                "consolidated document does not echo the computed proposal"
            );
            Err(StageError::EchoDrift { paths: drifted_paths })
        }
    }
}

/// Accepts the wrapped form (`propuesta_comercial` + optional `metadatos`)
/// or the bare proposal content.
pub fn normalize(answer: StructuredRecord) -> Result<Value, StageError> {
    match answer.get(PROPOSAL_KEY) {
        Some(Value::Object(_)) => Ok(Value::Object(answer)),
        Some(_) => Err(StageError::Schema(format!("`{PROPOSAL_KEY}` must be an object"))),
        None => {
            let mut wrapped = StructuredRecord::new();
            wrapped.insert(PROPOSAL_KEY.to_string(), Value::Object(answer));
            Ok(Value::Object(wrapped))
        }
    }
}

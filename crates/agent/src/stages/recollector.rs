use propuesta_core::domain::intake::{missing_fields_message, IntakeDraft, IntakeField};
use serde_json::Value;
use tracing::{info, warn};

use super::{required, required_array, required_string, PipelineStage, StageContext, StageError};

pub const SYSTEM_INSTRUCTION: &str = r#"Eres un asistente que valida los datos de un formulario comercial.

Revisa las variables recibidas y determina cuáles de estas variables obligatorias no tienen un valor válido (vacías, nulas, cero o ilegibles):
nombre_empresa, numero_trabajadores, codigoCIIU, aportesMensuales, porcentajeReinversion, enfoquesPrioritarios, correo_responsable.

Responde únicamente con un JSON con esta estructura exacta:
{
  "datos_faltantes": [],
  "proximo_paso": "",
  "mensaje": ""
}

- "datos_faltantes": nombres técnicos de los campos sin valor válido; lista vacía si todo está completo.
- "proximo_paso": "solicitar_datos_faltantes" si falta algún dato, "perfilamiento_cliente" si no.
- "mensaje": texto para el usuario con los nombres descriptivos de los campos faltantes; cadena vacía si no falta nada."#;

const REQUEST_MISSING: &str = "solicitar_datos_faltantes";
const PROCEED: &str = "perfilamiento_cliente";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecollectorNextStep {
    RequestMissingFields,
    Proceed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecollectorResult {
    pub missing_fields: Vec<IntakeField>,
    pub next_step: RecollectorNextStep,
    /// Empty exactly when no field is missing.
    pub message: String,
}

impl RecollectorResult {
    fn proceed() -> Self {
        Self {
            missing_fields: Vec::new(),
            next_step: RecollectorNextStep::Proceed,
            message: String::new(),
        }
    }

    fn request(missing_fields: Vec<IntakeField>, message: Option<String>) -> Self {
        let message = message
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| missing_fields_message(&missing_fields));
        Self { missing_fields, next_step: RecollectorNextStep::RequestMissingFields, message }
    }
}

pub fn user_instruction(draft: &IntakeDraft) -> String {
    let show = |value: Option<String>| value.unwrap_or_default();
    format!(
        "**variables identificadas**\n\n\
         - nombre_empresa: {}\n\
         - numero_trabajadores: {}\n\
         - codigoCIIU: {}\n\
         - aportesMensuales: {}\n\
         - porcentajeReinversion: {}\n\
         - enfoquesPrioritarios: {}\n\
         - correo_responsable: {}\n",
        show(draft.company_name.clone()),
        show(draft.employee_count.map(|count| count.to_string())),
        show(draft.industry_code.clone()),
        show(draft.monthly_contribution.map(|amount| amount.to_string())),
        show(draft.reinvestment_percentage.map(|pct| pct.to_string())),
        show(draft.priority_focus.clone()),
        show(draft.recipient_email.clone()),
    )
}

/// Deterministic completeness check first; only a complete draft reaches
/// the generative stage, whose verdict is schema-checked.
pub async fn run(
    context: &StageContext<'_>,
    draft: &IntakeDraft,
) -> Result<RecollectorResult, StageError> {
    let missing = draft.missing_fields();
    if !missing.is_empty() {
        info!(
            event_name = "pipeline.recollector.missing_fields",
            correlation_id = context.correlation_id,
            missing = ?missing,
            "intake is incomplete, skipping generative check"
        );
        return Ok(RecollectorResult::request(missing, None));
    }

    let record = context
        .invoke_structured(
            PipelineStage::Recollector,
            SYSTEM_INSTRUCTION,
            user_instruction(draft),
            context.settings.temperature,
        )
        .await?;
    let result = parse(&record)?;

    if result.next_step == RecollectorNextStep::RequestMissingFields {
        warn!(
            event_name = "pipeline.recollector.flagged_fields",
            correlation_id = context.correlation_id,
            missing = ?result.missing_fields,
            "generative recollector flagged fields the deterministic check accepted"
        );
    }
    Ok(result)
}

pub fn parse(record: &serde_json::Map<String, Value>) -> Result<RecollectorResult, StageError> {
    let listed = required_array(record, "datos_faltantes")?;
    let next_step = required_string(record, "proximo_paso")?;
    let message = match required(record, "mensaje")? {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        _ => return Err(StageError::Schema("`mensaje` must be a string".to_string())),
    };

    let mut recognised = Vec::new();
    for value in listed {
        let name = value.as_str().ok_or_else(|| {
            StageError::Schema("`datos_faltantes` must contain only strings".to_string())
        })?;
        if let Some(field) = IntakeField::from_name(name) {
            if !recognised.contains(&field) {
                recognised.push(field);
            }
        }
    }
    recognised.sort();

    match next_step.as_str() {
        REQUEST_MISSING if recognised.is_empty() => Ok(RecollectorResult::proceed()),
        REQUEST_MISSING => Ok(RecollectorResult::request(recognised, Some(message))),
        PROCEED => Ok(RecollectorResult::proceed()),
        other => Err(StageError::Schema(format!(
            "`proximo_paso` must be `{REQUEST_MISSING}` or `{PROCEED}`, found `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use propuesta_core::domain::intake::{IntakeDraft, IntakeField};
    use serde_json::json;

    use super::{parse, run, RecollectorNextStep};
    use crate::llm::ScriptedClient;
    use crate::stages::{StageContext, StageError, StageSettings};

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().expect("object")
    }

    fn complete_draft() -> IntakeDraft {
        IntakeDraft::from_json(&json!({
            "nombre_empresa": "Acme",
            "numero_empleados": 150,
            "codigo_ciiu": "4530",
            "aportes_mensuales": 8000000,
            "porcentaje_reinversion": 20,
            "enfoque_prioritario": "Seguridad",
            "correo_destinatario": "a@b.com"
        }))
    }

    #[tokio::test]
    async fn incomplete_draft_short_circuits_without_generation() {
        let client = ScriptedClient::by_label(Vec::<(String, String)>::new());
        let context =
            StageContext { correlation_id: "run-1", client: &client, settings: StageSettings::default() };
        let draft = IntakeDraft::from_json(&json!({ "numero_empleados": 10 }));

        let result = run(&context, &draft).await.expect("recollector result");

        assert_eq!(result.next_step, RecollectorNextStep::RequestMissingFields);
        assert_eq!(result.missing_fields.len(), 6);
        assert_eq!(result.missing_fields[0], IntakeField::CompanyName);
        assert!(result.message.contains("Nombre de la Empresa"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn complete_draft_is_confirmed_by_generation() {
        let client = ScriptedClient::by_label([(
            "recollector",
            "```json\n{\"datos_faltantes\": [], \"proximo_paso\": \"perfilamiento_cliente\", \"mensaje\": \"\"}\n```",
        )]);
        let context =
            StageContext { correlation_id: "run-2", client: &client, settings: StageSettings::default() };

        let result = run(&context, &complete_draft()).await.expect("recollector result");

        assert_eq!(result.next_step, RecollectorNextStep::Proceed);
        assert!(result.message.is_empty());
        assert_eq!(client.labels(), vec!["recollector".to_string()]);
        assert!(client.calls()[0].user_instruction.contains("codigoCIIU: 4530"));
    }

    #[tokio::test]
    async fn unparsable_answer_is_a_stage_failure() {
        let client = ScriptedClient::by_label([("recollector", "no json here")]);
        let context =
            StageContext { correlation_id: "run-3", client: &client, settings: StageSettings::default() };

        let error = run(&context, &complete_draft()).await.expect_err("unparsable");
        assert_eq!(error, StageError::Unparsable);
    }

    #[test]
    fn parse_honours_recognised_fields_only() {
        let result = parse(&object(json!({
            "datos_faltantes": ["codigoCIIU", "telefono"],
            "proximo_paso": "solicitar_datos_faltantes",
            "mensaje": ""
        })))
        .expect("parsed");
        assert_eq!(result.missing_fields, vec![IntakeField::IndustryCode]);
        assert_eq!(
            result.message,
            "Faltan los siguientes datos obligatorios: Código CIIU. Por favor completa el formulario."
        );

        let result = parse(&object(json!({
            "datos_faltantes": ["telefono"],
            "proximo_paso": "solicitar_datos_faltantes",
            "mensaje": "Falta el teléfono"
        })))
        .expect("parsed");
        assert_eq!(result.next_step, RecollectorNextStep::Proceed);
        assert!(result.message.is_empty());
    }

    #[test]
    fn parse_rejects_schema_violations() {
        let missing_key = parse(&object(json!({ "datos_faltantes": [], "mensaje": "" })));
        assert!(matches!(missing_key, Err(StageError::Schema(_))));

        let bad_step = parse(&object(json!({
            "datos_faltantes": [],
            "proximo_paso": "continuar",
            "mensaje": ""
        })));
        assert!(matches!(bad_step, Err(StageError::Schema(_))));

        let bad_list = parse(&object(json!({
            "datos_faltantes": "nombre_empresa",
            "proximo_paso": "perfilamiento_cliente",
            "mensaje": ""
        })));
        assert!(matches!(bad_list, Err(StageError::Schema(_))));
    }
}

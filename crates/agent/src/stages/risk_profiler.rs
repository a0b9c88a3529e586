use propuesta_core::domain::intake::IntakeRecord;
use propuesta_core::domain::risk::RiskProfile;
use serde_json::{Map, Value};

use super::{required_string, string_list, PipelineStage, StageContext, StageError};

pub const SYSTEM_INSTRUCTION: &str = r#"Eres un especialista en Seguridad y Salud en el Trabajo (SST) en Colombia.
Determina el perfil de riesgo de una empresa a partir de su código CIIU y su número de trabajadores.

Marco normativo: Decreto 1072 de 2015, Resolución 0312 de 2019, Resolución 1111 de 2017 y Decreto 768 de 2022.

- "clase_riesgo": usa las primeras 4 cifras del código CIIU para determinar la clase de riesgo (1 a 5) según el Decreto 768 de 2022. Si el código no es claro, usa la actividad principal. Devuelve la clase y la actividad económica, por ejemplo "Clase de Riesgo 3, la Actividad Economica es Manufactura".
- "riesgos_generales": lista de los principales riesgos de esa actividad.
- "obligaciones_legales": lista de obligaciones según la Resolución 0312 de 2019, considerando la clase de riesgo y el número de trabajadores.
- "proximo_paso": "Error_Perfilamiento" si no pudiste determinar la clase de riesgo; en otro caso "seleccion_productos".

Responde únicamente con un JSON:
{
  "clase_riesgo": "",
  "riesgos_generales": [],
  "obligaciones_legales": [],
  "proximo_paso": ""
}"#;

const PROFILING_ERROR: &str = "Error_Perfilamiento";
const PROCEED: &str = "seleccion_productos";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskNextStep {
    ProfilingError,
    Proceed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskAssessment {
    pub profile: RiskProfile,
    pub next_step: RiskNextStep,
}

pub fn user_instruction(record: &IntakeRecord) -> String {
    let code_line = match record.industry_prefix() {
        Some(prefix) => format!("Código CIIU (primeras 4 cifras): {prefix}"),
        None => format!("Código CIIU (ambiguo): {}", record.industry_code),
    };
    let activity = record.main_activity.as_deref().unwrap_or("No especificada");
    format!(
        "**variables identificadas**\n\n\
         {code_line}\n\
         Actividad principal (solo si el CIIU no está disponible o es ambiguo): {activity}\n\
         numeroTrabajadores: {}\n",
        record.employee_count
    )
}

pub async fn run(
    context: &StageContext<'_>,
    record: &IntakeRecord,
) -> Result<RiskAssessment, StageError> {
    let answer = context
        .invoke_structured(
            PipelineStage::RiskProfiler,
            SYSTEM_INSTRUCTION,
            user_instruction(record),
            context.settings.temperature,
        )
        .await?;
    parse(&answer)
}

pub fn parse(record: &Map<String, Value>) -> Result<RiskAssessment, StageError> {
    let risk_class = required_string(record, "clase_riesgo")?;
    let general_risks = list_field(record, &["riesgos_generales"])?;
    // Older prompt revisions capitalised this key.
    let legal_obligations = list_field(record, &["obligaciones_legales", "Obligaciones_legales"])?;
    let next_step = match required_string(record, "proximo_paso")?.as_str() {
        PROFILING_ERROR => RiskNextStep::ProfilingError,
        PROCEED => RiskNextStep::Proceed,
        other => {
            return Err(StageError::Schema(format!(
                "`proximo_paso` must be `{PROFILING_ERROR}` or `{PROCEED}`, found `{other}`"
            )))
        }
    };

    if next_step == RiskNextStep::Proceed && risk_class.is_empty() {
        return Err(StageError::Schema("`clase_riesgo` is empty".to_string()));
    }

    Ok(RiskAssessment {
        profile: RiskProfile { risk_class, general_risks, legal_obligations },
        next_step,
    })
}

fn list_field(record: &Map<String, Value>, keys: &[&str]) -> Result<Vec<String>, StageError> {
    let Some((key, value)) = keys.iter().find_map(|key| record.get(*key).map(|value| (*key, value)))
    else {
        return Err(StageError::Schema(format!("missing key `{}`", keys[0])));
    };
    match value {
        Value::Array(items) => string_list(items, key),
        _ => Err(StageError::Schema(format!("`{key}` must be a list"))),
    }
}

//! Product selection: the generative stage proposes catalog references, the
//! budget allocation decides hours and totals.

use std::collections::HashSet;

use propuesta_core::budget::allocation::{
    allocate, select_value_added, AllocationLimits, Candidate, HoursPolicy,
};
use propuesta_core::domain::catalog::{CatalogItem, CatalogPool};
use propuesta_core::domain::decimal_from_json;
use propuesta_core::domain::intake::IntakeRecord;
use propuesta_core::domain::proposal::ProductSelection;
use propuesta_core::domain::risk::RiskProfile;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{required_array, required_string, PipelineStage, StageContext, StageError};

pub const SYSTEM_INSTRUCTION: &str = r#"Eres un especialista en diseño de propuestas comerciales de prevención de riesgos laborales.
Selecciona productos del catálogo **Programas** según el perfil de riesgo del cliente. Cada producto tiene un identificador numérico "ref".

1. Productos obligatorios: categoría "DIFERENCIAL". Elige los que respondan directamente a las obligaciones legales del perfil. Máximo 30.
2. Productos prioritarios: categorías "Programa de Prevención", "Medicina Preventiva y del Trabajo", "Laboratorio Clínico", "HIGIENE" y "Vacunación". Elige los que se alineen con el enfoque prioritario y los riesgos generales.
3. Valores agregados: categoría "VALOR AGREGADO". Elige cerca de 18 relevantes para el cliente. No consumen presupuesto.
4. Ordena cada lista de mayor a menor relevancia.
5. Para productos obligatorios y prioritarios puedes sugerir "horas_asignadas" (entero) de modo que el total no supere el presupuesto anual.

Responde únicamente con un JSON con esta estructura exacta:
{
  "productos_obligatorios": [{ "ref": 0, "horas_asignadas": 0 }],
  "productos_prioritarios": [{ "ref": 0, "horas_asignadas": 0 }],
  "valores_agregados": [{ "ref": 0 }],
  "proximo_paso": "generar_propuesta_final"
}"#;

const NEXT_STEP: &str = "generar_propuesta_final";
const LIST_KEYS: [&str; 3] = ["productos_obligatorios", "productos_prioritarios", "valores_agregados"];

pub struct SelectorInput<'a> {
    pub record: &'a IntakeRecord,
    pub risk_profile: &'a RiskProfile,
    pub annual_budget: Decimal,
    pub catalog: &'a [CatalogItem],
    pub max_candidates: usize,
    pub limits: AllocationLimits,
    pub policy: &'a dyn HoursPolicy,
}

/// One catalog reference the stage chose, in answer order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChosenReference {
    pub index: usize,
    pub suggested_hours: Option<u32>,
}

pub fn user_instruction(input: &SelectorInput<'_>, candidates: &[CatalogItem]) -> String {
    let programs = candidates
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mut entry = serde_json::to_value(item).unwrap_or(Value::Null);
            if let Value::Object(fields) = &mut entry {
                fields.insert("ref".to_string(), Value::from(index));
            }
            entry
        })
        .collect::<Vec<_>>();
    let programs = serde_json::to_string_pretty(&programs).unwrap_or_else(|_| "[]".to_string());
    let risks = serde_json::to_string(&input.risk_profile.general_risks)
        .unwrap_or_else(|_| "[]".to_string());
    let obligations = serde_json::to_string(&input.risk_profile.legal_obligations)
        .unwrap_or_else(|_| "[]".to_string());

    format!(
        "**Perfil del Cliente**\n\
         - numeroTrabajadores: {}\n\
         - presupuestoAnual: {}\n\
         - enfoquesPrioritarios: {}\n\
         - clase_riesgo: {}\n\
         - riesgos_generales: {risks}\n\
         - obligaciones_legales: {obligations}\n\n\
         **Programas**\n{programs}\n",
        input.record.employee_count,
        input.annual_budget,
        input.record.priority_focus,
        input.risk_profile.risk_class,
    )
}

pub async fn run(
    context: &StageContext<'_>,
    input: &SelectorInput<'_>,
) -> Result<ProductSelection, StageError> {
    let candidates = &input.catalog[..input.catalog.len().min(input.max_candidates)];
    if candidates.is_empty() {
        info!(
            event_name = "pipeline.selector.empty_catalog",
            correlation_id = context.correlation_id,
            "no catalog candidates available, producing an empty selection"
        );
        return Ok(ProductSelection::empty(input.annual_budget));
    }

    let answer = context
        .invoke_structured(
            PipelineStage::ProductSelector,
            SYSTEM_INSTRUCTION,
            user_instruction(input, candidates),
            context.settings.selector_temperature,
        )
        .await?;
    let chosen = parse(&answer, candidates)?;

    let selection = build_selection(context.correlation_id, input, candidates, &chosen);
    info!(
        event_name = "pipeline.selector.allocated",
        correlation_id = context.correlation_id,
        mandatory = selection.mandatory_products.len(),
        priority = selection.priority_products.len(),
        value_added = selection.value_added.len(),
        total_products = %selection.summary.total_products,
        annual_budget = %selection.summary.annual_budget,
        "budget allocation completed"
    );
    Ok(selection)
}

/// Validates the answer shape and resolves every entry to a candidate index.
/// Entries that point nowhere are dropped; the three lists are returned
/// concatenated in answer order.
pub fn parse(
    answer: &Map<String, Value>,
    candidates: &[CatalogItem],
) -> Result<Vec<ChosenReference>, StageError> {
    let next_step = required_string(answer, "proximo_paso")?;
    if next_step != NEXT_STEP {
        return Err(StageError::Schema(format!(
            "`proximo_paso` must be `{NEXT_STEP}`, found `{next_step}`"
        )));
    }

    let mut chosen = Vec::new();
    for key in LIST_KEYS {
        for entry in required_array(answer, key)? {
            let Value::Object(fields) = entry else {
                return Err(StageError::Schema(format!("`{key}` must contain objects")));
            };
            match resolve_index(fields, candidates) {
                Some(index) => chosen.push(ChosenReference {
                    index,
                    suggested_hours: fields.get("horas_asignadas").and_then(positive_hours),
                }),
                None => debug!(list = key, "dropping selection entry without a known catalog ref"),
            }
        }
    }
    Ok(chosen)
}

fn resolve_index(fields: &Map<String, Value>, candidates: &[CatalogItem]) -> Option<usize> {
    if let Some(index) = fields
        .get("ref")
        .and_then(decimal_from_json)
        .filter(|value| value.fract().is_zero())
        .and_then(|value| value.to_usize())
        .filter(|index| *index < candidates.len())
    {
        return Some(index);
    }

    let description = fields.get("descripcion_programas_de_prevencion")?.as_str()?.trim();
    candidates.iter().position(|item| item.description.eq_ignore_ascii_case(description))
}

fn positive_hours(value: &Value) -> Option<u32> {
    decimal_from_json(value)
        .filter(|hours| *hours > Decimal::ZERO)
        .and_then(|hours| hours.floor().to_u32())
        .filter(|hours| *hours > 0)
}

/// Re-tiers the chosen references by their real category and runs the
/// budget allocation.
pub fn build_selection(
    correlation_id: &str,
    input: &SelectorInput<'_>,
    candidates: &[CatalogItem],
    chosen: &[ChosenReference],
) -> ProductSelection {
    let mut seen = HashSet::new();
    let mut mandatory = Vec::new();
    let mut priority = Vec::new();
    let mut value_added = Vec::new();

    for reference in chosen {
        if !seen.insert(reference.index) {
            continue;
        }
        let item = &candidates[reference.index];
        match item.pool() {
            Some(CatalogPool::Mandatory | CatalogPool::Priority) => {
                match Candidate::from_catalog(item.clone(), reference.suggested_hours) {
                    Some(candidate) if candidate.pool == CatalogPool::Mandatory => {
                        mandatory.push(candidate)
                    }
                    Some(candidate) => priority.push(candidate),
                    None => debug!(
                        correlation_id,
                        description = %item.description,
                        "dropping product without a positive tariff"
                    ),
                }
            }
            Some(CatalogPool::ValueAdded) => value_added.push(item.clone()),
            Some(CatalogPool::Advisory) | None => debug!(
                correlation_id,
                category = %item.category,
                "dropping product outside the budgeted pools"
            ),
        }
    }

    let mut selection =
        allocate(input.annual_budget, mandatory, priority, input.limits, input.policy);
    let target = input.limits.value_added_target;
    selection.value_added = select_value_added(&value_added, target);
    if selection.value_added.is_empty() {
        selection.value_added = select_value_added(candidates, target);
        if !selection.value_added.is_empty() {
            info!(
                event_name = "pipeline.selector.value_added_fallback",
                correlation_id,
                value_added = selection.value_added.len(),
                "no value-added items chosen, using the first catalog entries"
            );
        }
    }
    selection
}

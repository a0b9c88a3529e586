//! Echo guardrail for the consolidation stage: its output must repeat the
//! document it was given, value for value.

use propuesta_core::domain::decimal_from_json;
use serde_json::{Map, Value};

use crate::stages::json_type;

pub const DOCUMENTER_DRIFT: &str = "documenter_drift";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Reject { reason_code: &'static str, drifted_paths: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoPolicy {
    /// Top-level keys owned by the orchestrator and never compared.
    pub ignored_keys: Vec<String>,
    pub trim_strings: bool,
    pub max_reported_paths: usize,
}

impl Default for EchoPolicy {
    fn default() -> Self {
        Self { ignored_keys: vec!["metadatos".to_string()], trim_strings: true, max_reported_paths: 25 }
    }
}

impl EchoPolicy {
    pub fn evaluate(&self, expected: &Value, produced: &Value) -> GuardrailDecision {
        let mut drifted = Vec::new();
        match (expected, produced) {
            (Value::Object(expected), Value::Object(produced)) => {
                let expected = self.without_ignored(expected);
                let produced = self.without_ignored(produced);
                self.compare_objects("", &expected, &produced, &mut drifted);
            }
            _ => self.compare("", expected, produced, &mut drifted),
        }

        if drifted.is_empty() {
            return GuardrailDecision::Allow;
        }
        drifted.truncate(self.max_reported_paths);
        GuardrailDecision::Reject { reason_code: DOCUMENTER_DRIFT, drifted_paths: drifted }
    }

    fn without_ignored(&self, object: &Map<String, Value>) -> Map<String, Value> {
        object
            .iter()
            .filter(|(key, _)| !self.ignored_keys.iter().any(|ignored| ignored == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn compare(&self, path: &str, expected: &Value, produced: &Value, drifted: &mut Vec<String>) {
        match (expected, produced) {
            (Value::Object(expected), Value::Object(produced)) => {
                self.compare_objects(path, expected, produced, drifted)
            }
            (Value::Array(expected), Value::Array(produced)) => {
                if expected.len() != produced.len() {
                    drifted.push(format!(
                        "{} (length {} != {})",
                        display(path),
                        produced.len(),
                        expected.len()
                    ));
                    return;
                }
                for (index, (expected, produced)) in expected.iter().zip(produced).enumerate() {
                    self.compare(&format!("{path}[{index}]"), expected, produced, drifted);
                }
            }
            (Value::Number(_), Value::Number(_)) => {
                if !numbers_equal(expected, produced) {
                    drifted.push(display(path).to_string());
                }
            }
            (Value::String(expected), Value::String(produced)) => {
                let equal = if self.trim_strings {
                    expected.trim() == produced.trim()
                } else {
                    expected == produced
                };
                if !equal {
                    drifted.push(display(path).to_string());
                }
            }
            (Value::Bool(expected), Value::Bool(produced)) if expected == produced => {}
            (Value::Null, Value::Null) => {}
            (Value::Bool(_), Value::Bool(_)) => drifted.push(display(path).to_string()),
            _ => drifted.push(format!(
                "{} (type {} != {})",
                display(path),
                json_type(produced),
                json_type(expected)
            )),
        }
    }

    fn compare_objects(
        &self,
        path: &str,
        expected: &Map<String, Value>,
        produced: &Map<String, Value>,
        drifted: &mut Vec<String>,
    ) {
        for (key, expected_value) in expected {
            let child = join(path, key);
            match produced.get(key) {
                Some(produced_value) => self.compare(&child, expected_value, produced_value, drifted),
                None => drifted.push(format!("{child} (missing)")),
            }
        }
        for key in produced.keys().filter(|key| !expected.contains_key(*key)) {
            drifted.push(format!("{} (unexpected)", join(path, key)));
        }
    }
}

fn numbers_equal(expected: &Value, produced: &Value) -> bool {
    match (decimal_from_json(expected), decimal_from_json(produced)) {
        (Some(expected), Some(produced)) => expected.normalize() == produced.normalize(),
        _ => expected.as_f64() == produced.as_f64(),
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EchoPolicy, GuardrailDecision, DOCUMENTER_DRIFT};

    fn expected() -> serde_json::Value {
        json!({
            "propuesta_comercial": {
                "presupuesto": { "presupuesto_anual": 19200000.0, "total_productos": 19080000.0 },
                "productos_obligatorios": [
                    { "descripcion_programas_de_prevencion": "Plan de emergencias", "horas_asignadas": 10 }
                ],
                "perfil_riesgo": { "clase_riesgo": "Clase 3", "riesgos_generales": ["ruido"] }
            },
            "metadatos": { "fecha_generacion": "2026-03-09", "version": "1.0", "estado": "generada" }
        })
    }

    fn drifted_paths(decision: GuardrailDecision) -> Vec<String> {
        match decision {
            GuardrailDecision::Reject { reason_code, drifted_paths } => {
                assert_eq!(reason_code, DOCUMENTER_DRIFT);
                drifted_paths
            }
            GuardrailDecision::Allow => Vec::new(),
        }
    }

    #[test]
    fn faithful_echo_is_allowed_even_with_different_metadata_and_number_forms() {
        let mut produced = expected();
        produced["metadatos"] = json!({ "version": "2.0" });
        produced["propuesta_comercial"]["presupuesto"]["presupuesto_anual"] = json!(19200000);
        produced["propuesta_comercial"]["perfil_riesgo"]["clase_riesgo"] = json!(" Clase 3 ");

        assert_eq!(EchoPolicy::default().evaluate(&expected(), &produced), GuardrailDecision::Allow);
    }

    #[test]
    fn recalculated_numbers_are_rejected_with_their_paths() {
        let mut produced = expected();
        produced["propuesta_comercial"]["presupuesto"]["total_productos"] = json!(19500000.0);
        produced["propuesta_comercial"]["productos_obligatorios"][0]["horas_asignadas"] = json!(12);

        let paths = drifted_paths(EchoPolicy::default().evaluate(&expected(), &produced));
        assert_eq!(
            paths,
            vec![
                "propuesta_comercial.presupuesto.total_productos".to_string(),
                "propuesta_comercial.productos_obligatorios[0].horas_asignadas".to_string(),
            ]
        );
    }

    #[test]
    fn structural_changes_are_rejected() {
        let mut produced = expected();
        produced["propuesta_comercial"]["perfil_riesgo"]["riesgos_generales"] = json!("ruido");
        produced["propuesta_comercial"]["productos_obligatorios"] = json!([]);
        produced["propuesta_comercial"]["extra"] = json!(true);
        if let Some(budget) = produced["propuesta_comercial"]["presupuesto"].as_object_mut() {
            budget.remove("total_productos");
        }

        let paths = drifted_paths(EchoPolicy::default().evaluate(&expected(), &produced));
        assert!(paths.contains(&"propuesta_comercial.presupuesto.total_productos (missing)".to_string()));
        assert!(paths.contains(&"propuesta_comercial.productos_obligatorios (length 0 != 1)".to_string()));
        assert!(paths
            .contains(&"propuesta_comercial.perfil_riesgo.riesgos_generales (type string != list)".to_string()));
        assert!(paths.contains(&"propuesta_comercial.extra (unexpected)".to_string()));
    }

    #[test]
    fn reported_paths_are_capped() {
        let policy = EchoPolicy { max_reported_paths: 1, ..EchoPolicy::default() };
        let produced = json!({ "propuesta_comercial": {} });
        assert_eq!(drifted_paths(policy.evaluate(&expected(), &produced)).len(), 1);
    }
}

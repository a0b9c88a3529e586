use serde::{Deserialize, Serialize};

/// Occupational risk profile derived from the industry code and headcount.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Free-form classification plus rationale, e.g.
    /// "Clase de Riesgo 3, la Actividad Economica es Manufactura".
    #[serde(rename = "clase_riesgo")]
    pub risk_class: String,
    #[serde(rename = "riesgos_generales")]
    pub general_risks: Vec<String>,
    #[serde(rename = "obligaciones_legales")]
    pub legal_obligations: Vec<String>,
}

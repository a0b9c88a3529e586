use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::decimal_from_json;

/// One program of the externally owned product catalog. Read-only to the
/// pipeline; tariff fields are hourly rates and at most one is usually set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(rename = "categoria_de_programas", default, deserialize_with = "lenient_text")]
    pub category: String,
    #[serde(
        rename = "descripcion_programas_de_prevencion",
        default,
        deserialize_with = "lenient_text"
    )]
    pub description: String,
    #[serde(rename = "subcategoria", default, deserialize_with = "lenient_text")]
    pub subcategory: String,
    #[serde(rename = "tema", default, deserialize_with = "lenient_text")]
    pub theme: String,
    #[serde(rename = "tipo", default, deserialize_with = "lenient_text")]
    pub item_type: String,
    #[serde(
        rename = "valor_de_la_hora_equipos",
        default,
        deserialize_with = "lenient_rate",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub equipment_rate: Option<Decimal>,
    #[serde(
        rename = "valor_hora_aliado_basico",
        default,
        deserialize_with = "lenient_rate",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub basic_ally_rate: Option<Decimal>,
    #[serde(
        rename = "valor_hora_aliado_especializado",
        default,
        deserialize_with = "lenient_rate",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub specialized_ally_rate: Option<Decimal>,
}

impl CatalogItem {
    pub fn program_category(&self) -> Option<ProgramCategory> {
        ProgramCategory::from_label(&self.category)
    }

    pub fn pool(&self) -> Option<CatalogPool> {
        self.program_category().map(ProgramCategory::pool)
    }
}

/// Selection pools the budget allocation works with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogPool {
    Mandatory,
    Priority,
    ValueAdded,
    Advisory,
}

/// The ten fixed catalog categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramCategory {
    Differential,
    ValueAdded,
    Professionals,
    PreventionProgram,
    Hygiene,
    Vaccination,
    PreventiveMedicine,
    ClinicalLab,
    Administrative,
    RiskAdvisor,
}

impl ProgramCategory {
    pub const ALL: [ProgramCategory; 10] = [
        Self::Differential,
        Self::ValueAdded,
        Self::Professionals,
        Self::PreventionProgram,
        Self::Hygiene,
        Self::Vaccination,
        Self::PreventiveMedicine,
        Self::ClinicalLab,
        Self::Administrative,
        Self::RiskAdvisor,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Differential => "DIFERENCIAL",
            Self::ValueAdded => "VALOR AGREGADO",
            Self::Professionals => "Profesionales",
            Self::PreventionProgram => "Programa de Prevención",
            Self::Hygiene => "HIGIENE",
            Self::Vaccination => "Vacunación",
            Self::PreventiveMedicine => "Medicina Preventiva y del Trabajo",
            Self::ClinicalLab => "Laboratorio Clínico",
            Self::Administrative => "Administrativo",
            Self::RiskAdvisor => "Asesor de Gestión del Riesgo",
        }
    }

    /// Case- and accent-insensitive match against the catalog's labels.
    pub fn from_label(raw: &str) -> Option<Self> {
        let normalized = normalize_label(raw);
        match normalized.as_str() {
            "diferencial" | "differential" => Some(Self::Differential),
            "valor agregado" | "value added" => Some(Self::ValueAdded),
            "profesionales" => Some(Self::Professionals),
            "programa de prevencion" => Some(Self::PreventionProgram),
            "higiene" => Some(Self::Hygiene),
            "vacunacion" => Some(Self::Vaccination),
            "medicina preventiva y del trabajo" | "medicina preventiva" => {
                Some(Self::PreventiveMedicine)
            }
            "laboratorio clinico" => Some(Self::ClinicalLab),
            "administrativo" => Some(Self::Administrative),
            "asesor de gestion del riesgo" => Some(Self::RiskAdvisor),
            _ => None,
        }
    }

    pub fn pool(self) -> CatalogPool {
        match self {
            Self::Differential => CatalogPool::Mandatory,
            Self::PreventionProgram
            | Self::PreventiveMedicine
            | Self::ClinicalLab
            | Self::Hygiene
            | Self::Vaccination => CatalogPool::Priority,
            Self::ValueAdded => CatalogPool::ValueAdded,
            Self::Professionals | Self::Administrative | Self::RiskAdvisor => CatalogPool::Advisory,
        }
    }
}

fn normalize_label(raw: &str) -> String {
    let folded = raw
        .trim()
        .chars()
        .map(|character| match character {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other.to_ascii_lowercase(),
        })
        .collect::<String>();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    })
}

fn lenient_rate<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from_json(&value))
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::budget::tariff::{resolve_tariff, ResolvedTariff, TariffField};
use crate::budget::BudgetSummary;
use crate::domain::catalog::CatalogItem;
use crate::domain::intake::IntakeRecord;
use crate::domain::risk::RiskProfile;

pub const PROPOSAL_VERSION: &str = "1.0";
pub const PROPOSAL_STATUS: &str = "generada";

/// A mandatory or priority catalog item with hours and a budgeted subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedProduct {
    #[serde(rename = "categoria_de_programas")]
    pub category: String,
    #[serde(rename = "descripcion_programas_de_prevencion")]
    pub description: String,
    #[serde(rename = "subcategoria")]
    pub subcategory: String,
    #[serde(rename = "tema")]
    pub theme: String,
    #[serde(rename = "tipo")]
    pub item_type: String,
    #[serde(rename = "tipo_tarifa_usada")]
    pub tariff_type_used: TariffField,
    #[serde(rename = "tarifa_hora", with = "rust_decimal::serde::float")]
    pub hourly_rate: Decimal,
    #[serde(rename = "horas_asignadas")]
    pub hours_assigned: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

impl SelectedProduct {
    pub fn from_catalog(item: &CatalogItem, tariff: ResolvedTariff, hours_assigned: u32) -> Self {
        Self {
            category: item.category.clone(),
            description: item.description.clone(),
            subcategory: item.subcategory.clone(),
            theme: item.theme.clone(),
            item_type: item.item_type.clone(),
            tariff_type_used: tariff.field,
            hourly_rate: tariff.rate,
            hours_assigned,
            subtotal: tariff.rate * Decimal::from(hours_assigned),
        }
    }
}

/// Value-added item. Its reference tariff is informative only and never
/// enters budget totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueAddedItem {
    #[serde(rename = "categoria_de_programas")]
    pub category: String,
    #[serde(rename = "descripcion_programas_de_prevencion")]
    pub description: String,
    #[serde(rename = "subcategoria")]
    pub subcategory: String,
    #[serde(rename = "tema")]
    pub theme: String,
    #[serde(rename = "tipo")]
    pub item_type: String,
    #[serde(rename = "tarifa_referencia", with = "rust_decimal::serde::float")]
    pub reference_rate: Decimal,
}

impl ValueAddedItem {
    pub fn from_catalog(item: &CatalogItem) -> Self {
        Self {
            category: item.category.clone(),
            description: item.description.clone(),
            subcategory: item.subcategory.clone(),
            theme: item.theme.clone(),
            item_type: item.item_type.clone(),
            reference_rate: resolve_tariff(item).map_or(Decimal::ZERO, |tariff| tariff.rate),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInformation {
    pub nombre_empresa: String,
    pub numero_empleados: u32,
    pub codigo_ciiu: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub aportes_mensuales: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub porcentaje_reinversion: Decimal,
    pub enfoque_prioritario: String,
    pub correo_destinatario: String,
}

impl From<&IntakeRecord> for ClientInformation {
    fn from(record: &IntakeRecord) -> Self {
        Self {
            nombre_empresa: record.company_name.clone(),
            numero_empleados: record.employee_count,
            codigo_ciiu: record.industry_code.clone(),
            aportes_mensuales: record.monthly_contribution,
            porcentaje_reinversion: record.reinvestment_percentage,
            enfoque_prioritario: record.priority_focus.clone(),
            correo_destinatario: record.recipient_email.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSection {
    #[serde(with = "rust_decimal::serde::float")]
    pub aportes_mensuales: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub porcentaje_reinversion: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub presupuesto_anual: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_productos: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_productos_obligatorios: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_productos_prioritarios: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub saldo_restante: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub porcentaje_utilizado: Decimal,
}

impl BudgetSection {
    pub fn new(record: &IntakeRecord, summary: &BudgetSummary) -> Self {
        Self {
            aportes_mensuales: record.monthly_contribution,
            porcentaje_reinversion: record.reinvestment_percentage,
            presupuesto_anual: summary.annual_budget,
            total_productos: summary.total_products,
            total_productos_obligatorios: summary.total_mandatory,
            total_productos_prioritarios: summary.total_priority,
            saldo_restante: summary.remaining_balance,
            porcentaje_utilizado: summary.utilization_percent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialProposal {
    #[serde(rename = "informacion_cliente")]
    pub client: ClientInformation,
    #[serde(rename = "perfil_riesgo")]
    pub risk_profile: RiskProfile,
    #[serde(rename = "presupuesto")]
    pub budget: BudgetSection,
    #[serde(rename = "productos_obligatorios")]
    pub mandatory_products: Vec<SelectedProduct>,
    #[serde(rename = "productos_prioritarios")]
    pub priority_products: Vec<SelectedProduct>,
    #[serde(rename = "valores_agregados")]
    pub value_added: Vec<ValueAddedItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    #[serde(rename = "fecha_generacion")]
    pub generation_date: String,
    pub version: String,
    #[serde(rename = "estado")]
    pub status: String,
}

impl ProposalMetadata {
    pub fn generated_on(date: NaiveDate) -> Self {
        Self {
            generation_date: date.format("%Y-%m-%d").to_string(),
            version: PROPOSAL_VERSION.to_string(),
            status: PROPOSAL_STATUS.to_string(),
        }
    }
}

/// Terminal artifact of a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDocument {
    #[serde(rename = "propuesta_comercial")]
    pub proposal: CommercialProposal,
    #[serde(rename = "metadatos")]
    pub metadata: ProposalMetadata,
}

/// Everything the budget-constrained selection produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSelection {
    #[serde(rename = "productos_obligatorios")]
    pub mandatory_products: Vec<SelectedProduct>,
    #[serde(rename = "productos_prioritarios")]
    pub priority_products: Vec<SelectedProduct>,
    #[serde(rename = "valores_agregados")]
    pub value_added: Vec<ValueAddedItem>,
    #[serde(rename = "resumen_presupuesto")]
    pub summary: BudgetSummary,
}

impl ProductSelection {
    pub fn empty(annual_budget: Decimal) -> Self {
        Self {
            summary: BudgetSummary::from_totals(annual_budget, Decimal::ZERO, Decimal::ZERO),
            ..Self::default()
        }
    }
}

impl ProposalDocument {
    pub fn assemble(
        record: &IntakeRecord,
        risk_profile: &RiskProfile,
        selection: &ProductSelection,
        generated_on: NaiveDate,
    ) -> Self {
        Self {
            proposal: CommercialProposal {
                client: ClientInformation::from(record),
                risk_profile: risk_profile.clone(),
                budget: BudgetSection::new(record, &selection.summary),
                mandatory_products: selection.mandatory_products.clone(),
                priority_products: selection.priority_products.clone(),
                value_added: selection.value_added.clone(),
            },
            metadata: ProposalMetadata::generated_on(generated_on),
        }
    }

    /// File name used when the rendered document is downloaded.
    pub fn download_name(&self, extension: &str) -> String {
        download_name_for(&self.proposal.client.nombre_empresa, extension)
    }
}

pub fn download_name_for(company_name: &str, extension: &str) -> String {
    let sanitized = company_name
        .trim()
        .chars()
        .map(|character| {
            if character.is_alphanumeric() || matches!(character, '-' | '_') {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();
    let stem = if sanitized.is_empty() { "propuesta".to_string() } else { sanitized };
    format!("Propuesta_{stem}.{extension}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{download_name_for, ProductSelection, ProposalDocument};
    use crate::domain::intake::IntakeRecord;
    use crate::domain::risk::RiskProfile;

    fn record() -> IntakeRecord {
        IntakeRecord {
            company_name: "Acme".to_string(),
            employee_count: 150,
            industry_code: "4530".to_string(),
            monthly_contribution: Decimal::from(8_000_000),
            reinvestment_percentage: Decimal::from(20),
            priority_focus: "Seguridad".to_string(),
            recipient_email: "a@b.com".to_string(),
            main_activity: None,
        }
    }

    #[test]
    fn assembled_document_uses_wire_shape() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).expect("date");
        let document = ProposalDocument::assemble(
            &record(),
            &RiskProfile::default(),
            &ProductSelection::empty(Decimal::from(19_200_000)),
            date,
        );
        let value = serde_json::to_value(&document).expect("serialize");

        assert_eq!(value["metadatos"]["fecha_generacion"], "2026-03-09");
        assert_eq!(value["metadatos"]["version"], "1.0");
        assert_eq!(value["metadatos"]["estado"], "generada");
        assert_eq!(value["propuesta_comercial"]["informacion_cliente"]["nombre_empresa"], "Acme");
        assert_eq!(
            value["propuesta_comercial"]["presupuesto"]["presupuesto_anual"].as_f64(),
            Some(19_200_000.0)
        );
        assert_eq!(
            value["propuesta_comercial"]["presupuesto"]["saldo_restante"].as_f64(),
            Some(19_200_000.0)
        );
        assert!(value["propuesta_comercial"]["productos_obligatorios"].is_array());
        assert!(value["propuesta_comercial"]["perfil_riesgo"]["obligaciones_legales"].is_array());
    }

    #[test]
    fn download_names_are_filesystem_safe() {
        assert_eq!(download_name_for("Acme S.A.S", "pdf"), "Propuesta_Acme_S_A_S.pdf");
        assert_eq!(download_name_for("  ", "html"), "Propuesta_propuesta.html");
    }
}

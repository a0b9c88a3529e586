use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{decimal_from_json, percentage_from_json};
use crate::errors::DomainError;

/// Required intake form fields, in the order they are reported when missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntakeField {
    #[serde(rename = "nombre_empresa")]
    CompanyName,
    #[serde(rename = "numero_empleados")]
    EmployeeCount,
    #[serde(rename = "codigo_ciiu")]
    IndustryCode,
    #[serde(rename = "aportes_mensuales")]
    MonthlyContribution,
    #[serde(rename = "porcentaje_reinversion")]
    ReinvestmentPercentage,
    #[serde(rename = "enfoque_prioritario")]
    PriorityFocus,
    #[serde(rename = "correo_destinatario")]
    RecipientEmail,
}

impl IntakeField {
    pub const REQUIRED: [IntakeField; 7] = [
        Self::CompanyName,
        Self::EmployeeCount,
        Self::IndustryCode,
        Self::MonthlyContribution,
        Self::ReinvestmentPercentage,
        Self::PriorityFocus,
        Self::RecipientEmail,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::CompanyName => "nombre_empresa",
            Self::EmployeeCount => "numero_empleados",
            Self::IndustryCode => "codigo_ciiu",
            Self::MonthlyContribution => "aportes_mensuales",
            Self::ReinvestmentPercentage => "porcentaje_reinversion",
            Self::PriorityFocus => "enfoque_prioritario",
            Self::RecipientEmail => "correo_destinatario",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CompanyName => "Nombre de la Empresa",
            Self::EmployeeCount => "Número de Empleados",
            Self::IndustryCode => "Código CIIU",
            Self::MonthlyContribution => "Aportes Mensuales",
            Self::ReinvestmentPercentage => "Porcentaje de Reinversión",
            Self::PriorityFocus => "Enfoque Prioritario",
            Self::RecipientEmail => "Correo Destinatario",
        }
    }

    /// Resolves both the HTTP wire names and the names the Recollector prompt
    /// uses for the same fields.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "nombre_empresa" => Some(Self::CompanyName),
            "numero_empleados" | "numero_trabajadores" => Some(Self::EmployeeCount),
            "codigo_ciiu" | "codigoCIIU" => Some(Self::IndustryCode),
            "aportes_mensuales" | "aportesMensuales" => Some(Self::MonthlyContribution),
            "porcentaje_reinversion" | "porcentajeReinversion" => {
                Some(Self::ReinvestmentPercentage)
            }
            "enfoque_prioritario" | "enfoquesPrioritarios" => Some(Self::PriorityFocus),
            "correo_destinatario" | "correo_responsable" => Some(Self::RecipientEmail),
            _ => None,
        }
    }
}

impl fmt::Display for IntakeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Human-facing message listing missing fields by their descriptive labels.
pub fn missing_fields_message(missing: &[IntakeField]) -> String {
    if missing.is_empty() {
        return String::new();
    }
    let labels = missing.iter().map(|field| field.label()).collect::<Vec<_>>();
    format!(
        "Faltan los siguientes datos obligatorios: {}. Por favor completa el formulario.",
        labels.join(", ")
    )
}

/// Raw client submission before validation. Every field is optional here;
/// a value that is blank, zero or unparseable is treated as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntakeDraft {
    pub company_name: Option<String>,
    pub employee_count: Option<u32>,
    pub industry_code: Option<String>,
    pub monthly_contribution: Option<Decimal>,
    pub reinvestment_percentage: Option<Decimal>,
    pub priority_focus: Option<String>,
    pub recipient_email: Option<String>,
    pub main_activity: Option<String>,
}

impl IntakeDraft {
    pub fn from_json(value: &Value) -> Self {
        let empty = Map::new();
        let object = value.as_object().unwrap_or(&empty);
        let field = |name: &str| object.get(name).unwrap_or(&Value::Null);

        Self {
            company_name: text_field(field("nombre_empresa")),
            employee_count: count_field(field("numero_empleados")),
            industry_code: text_field(field("codigo_ciiu")),
            monthly_contribution: positive_decimal(field("aportes_mensuales")),
            reinvestment_percentage: percentage_from_json(field("porcentaje_reinversion"))
                .filter(|percentage| *percentage > Decimal::ZERO),
            priority_focus: text_field(field("enfoque_prioritario")),
            recipient_email: text_field(field("correo_destinatario")),
            main_activity: text_field(field("actividad_principal")),
        }
    }

    pub fn missing_fields(&self) -> Vec<IntakeField> {
        IntakeField::REQUIRED.into_iter().filter(|field| !self.has(*field)).collect()
    }

    fn has(&self, field: IntakeField) -> bool {
        match field {
            IntakeField::CompanyName => self.company_name.is_some(),
            IntakeField::EmployeeCount => self.employee_count.is_some(),
            IntakeField::IndustryCode => self.industry_code.is_some(),
            IntakeField::MonthlyContribution => self.monthly_contribution.is_some(),
            IntakeField::ReinvestmentPercentage => self.reinvestment_percentage.is_some(),
            IntakeField::PriorityFocus => self.priority_focus.is_some(),
            IntakeField::RecipientEmail => self.recipient_email.is_some(),
        }
    }

    pub fn into_record(self) -> Result<IntakeRecord, DomainError> {
        let missing = self.missing_fields();
        match self {
            Self {
                company_name: Some(company_name),
                employee_count: Some(employee_count),
                industry_code: Some(industry_code),
                monthly_contribution: Some(monthly_contribution),
                reinvestment_percentage: Some(reinvestment_percentage),
                priority_focus: Some(priority_focus),
                recipient_email: Some(recipient_email),
                main_activity,
            } => Ok(IntakeRecord {
                company_name,
                employee_count,
                industry_code,
                monthly_contribution,
                reinvestment_percentage,
                priority_focus,
                recipient_email,
                main_activity,
            }),
            _ => Err(DomainError::MissingIntakeFields(missing)),
        }
    }
}

impl From<&IntakeRecord> for IntakeDraft {
    fn from(record: &IntakeRecord) -> Self {
        Self {
            company_name: Some(record.company_name.clone()),
            employee_count: Some(record.employee_count),
            industry_code: Some(record.industry_code.clone()),
            monthly_contribution: Some(record.monthly_contribution),
            reinvestment_percentage: Some(record.reinvestment_percentage),
            priority_focus: Some(record.priority_focus.clone()),
            recipient_email: Some(record.recipient_email.clone()),
            main_activity: record.main_activity.clone(),
        }
    }
}

/// Validated intake. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRecord {
    #[serde(rename = "nombre_empresa")]
    pub company_name: String,
    #[serde(rename = "numero_empleados")]
    pub employee_count: u32,
    #[serde(rename = "codigo_ciiu")]
    pub industry_code: String,
    #[serde(rename = "aportes_mensuales", with = "rust_decimal::serde::float")]
    pub monthly_contribution: Decimal,
    #[serde(rename = "porcentaje_reinversion", with = "rust_decimal::serde::float")]
    pub reinvestment_percentage: Decimal,
    #[serde(rename = "enfoque_prioritario")]
    pub priority_focus: String,
    #[serde(rename = "correo_destinatario")]
    pub recipient_email: String,
    #[serde(rename = "actividad_principal", default, skip_serializing_if = "Option::is_none")]
    pub main_activity: Option<String>,
}

impl IntakeRecord {
    /// First four digits of the industry code, when the code starts with at
    /// least four digits. `None` means the code is ambiguous and the main
    /// activity description should be used instead.
    pub fn industry_prefix(&self) -> Option<&str> {
        let code = self.industry_code.trim();
        let digits = code.chars().take_while(|character| character.is_ascii_digit()).count();
        (digits >= 4).then(|| &code[..4])
    }
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn count_field(value: &Value) -> Option<u32> {
    let amount = decimal_from_json(value)?;
    if amount <= Decimal::ZERO || !amount.fract().is_zero() {
        return None;
    }
    amount.to_u32()
}

fn positive_decimal(value: &Value) -> Option<Decimal> {
    decimal_from_json(value).filter(|amount| *amount > Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{missing_fields_message, IntakeDraft, IntakeField};
    use crate::errors::DomainError;

    fn complete_form() -> serde_json::Value {
        json!({
            "nombre_empresa": "Acme",
            "numero_empleados": 150,
            "codigo_ciiu": "4530",
            "aportes_mensuales": 8000000,
            "porcentaje_reinversion": 20,
            "enfoque_prioritario": "Seguridad Industrial",
            "correo_destinatario": "a@b.com"
        })
    }

    #[test]
    fn complete_form_has_no_missing_fields() {
        let draft = IntakeDraft::from_json(&complete_form());
        assert!(draft.missing_fields().is_empty());

        let record = draft.into_record().expect("complete form should validate");
        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.employee_count, 150);
        assert_eq!(record.monthly_contribution, Decimal::new(8_000_000, 0));
        assert_eq!(record.reinvestment_percentage, Decimal::new(20, 0));
        assert_eq!(record.industry_prefix(), Some("4530"));
    }

    #[test]
    fn absent_blank_and_zero_values_are_missing() {
        let mut form = complete_form();
        let object = form.as_object_mut().expect("object");
        object.remove("nombre_empresa");
        object.insert("numero_empleados".to_string(), json!(0));
        object.insert("enfoque_prioritario".to_string(), json!("   "));
        object.insert("aportes_mensuales".to_string(), json!(null));

        let draft = IntakeDraft::from_json(&form);
        assert_eq!(
            draft.missing_fields(),
            vec![
                IntakeField::CompanyName,
                IntakeField::EmployeeCount,
                IntakeField::MonthlyContribution,
                IntakeField::PriorityFocus,
            ]
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let mut form = complete_form();
        let object = form.as_object_mut().expect("object");
        object.insert("numero_empleados".to_string(), json!("42"));
        object.insert("aportes_mensuales".to_string(), json!("$5,000,000"));
        object.insert("codigo_ciiu".to_string(), json!(453012));

        let record = IntakeDraft::from_json(&form).into_record().expect("valid");
        assert_eq!(record.employee_count, 42);
        assert_eq!(record.monthly_contribution, Decimal::new(5_000_000, 0));
        assert_eq!(record.industry_prefix(), Some("4530"));
    }

    #[test]
    fn dotted_thousands_keep_the_entered_amount() {
        let mut form = complete_form();
        let object = form.as_object_mut().expect("object");
        object.insert("aportes_mensuales".to_string(), json!("800.000"));
        object.insert("porcentaje_reinversion".to_string(), json!("20"));

        let record = IntakeDraft::from_json(&form).into_record().expect("valid");
        assert_eq!(record.monthly_contribution, Decimal::new(800_000, 0));
        assert_eq!(
            crate::budget::annual_budget(&record).expect("budget"),
            Decimal::new(1_920_000, 0)
        );
    }

    #[test]
    fn into_record_reports_missing_fields() {
        let draft = IntakeDraft::from_json(&json!({ "nombre_empresa": "Acme" }));
        let error = draft.into_record().expect_err("incomplete draft");
        match error {
            DomainError::MissingIntakeFields(fields) => {
                assert_eq!(fields.len(), 6);
                assert!(!fields.contains(&IntakeField::CompanyName));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ambiguous_industry_code_has_no_prefix() {
        let mut form = complete_form();
        form["codigo_ciiu"] = json!("45");
        let record = IntakeDraft::from_json(&form).into_record().expect("valid");
        assert_eq!(record.industry_prefix(), None);
    }

    #[test]
    fn message_uses_descriptive_labels() {
        let message =
            missing_fields_message(&[IntakeField::CompanyName, IntakeField::EmployeeCount]);
        assert_eq!(
            message,
            "Faltan los siguientes datos obligatorios: Nombre de la Empresa, Número de Empleados. Por favor completa el formulario."
        );
        assert!(missing_fields_message(&[]).is_empty());
    }

    #[test]
    fn prompt_aliases_resolve_to_fields() {
        assert_eq!(IntakeField::from_name("codigoCIIU"), Some(IntakeField::IndustryCode));
        assert_eq!(IntakeField::from_name("correo_responsable"), Some(IntakeField::RecipientEmail));
        assert_eq!(IntakeField::from_name("telefono"), None);
    }
}

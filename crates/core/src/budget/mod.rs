pub mod allocation;
pub mod tariff;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::intake::IntakeRecord;
use crate::errors::DomainError;

const MONTHS_PER_YEAR: u32 = 12;

/// `monthly_contribution × 12 × (reinvestment_percentage / 100)`, exact.
pub fn annual_budget(record: &IntakeRecord) -> Result<Decimal, DomainError> {
    record
        .monthly_contribution
        .checked_mul(Decimal::from(MONTHS_PER_YEAR))
        .and_then(|yearly| yearly.checked_mul(record.reinvestment_percentage))
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "annual budget overflows for monthly contribution {} and reinversion {}%",
                record.monthly_contribution, record.reinvestment_percentage
            ))
        })
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    #[serde(rename = "presupuesto_anual", with = "rust_decimal::serde::float")]
    pub annual_budget: Decimal,
    #[serde(rename = "total_productos_obligatorios", with = "rust_decimal::serde::float")]
    pub total_mandatory: Decimal,
    #[serde(rename = "total_productos_prioritarios", with = "rust_decimal::serde::float")]
    pub total_priority: Decimal,
    #[serde(rename = "total_productos", with = "rust_decimal::serde::float")]
    pub total_products: Decimal,
    #[serde(rename = "saldo_restante", with = "rust_decimal::serde::float")]
    pub remaining_balance: Decimal,
    #[serde(rename = "porcentaje_utilizado", with = "rust_decimal::serde::float")]
    pub utilization_percent: Decimal,
}

impl BudgetSummary {
    pub fn from_totals(
        annual_budget: Decimal,
        total_mandatory: Decimal,
        total_priority: Decimal,
    ) -> Self {
        let total_products = total_mandatory + total_priority;
        let utilization_percent = if annual_budget.is_zero() {
            Decimal::ZERO
        } else {
            total_products
                .checked_mul(Decimal::ONE_HUNDRED)
                .and_then(|scaled| scaled.checked_div(annual_budget))
                .or_else(|| {
                    total_products.checked_div(annual_budget)?.checked_mul(Decimal::ONE_HUNDRED)
                })
                .unwrap_or(Decimal::ZERO)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        Self {
            annual_budget,
            total_mandatory,
            total_priority,
            total_products,
            remaining_balance: annual_budget - total_products,
            utilization_percent,
        }
    }

    pub fn within_budget(&self) -> bool {
        self.total_products <= self.annual_budget
    }
}

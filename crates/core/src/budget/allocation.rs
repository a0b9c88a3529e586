//! Budget-constrained hour allocation for mandatory and priority products.
//!
//! Candidates arrive in relevance order (most relevant first). An
//! [`HoursPolicy`] proposes initial hours, then [`allocate`] enforces
//! `total_products <= annual_budget` with a greedy descent and spends what is
//! left with a fill pass. Value-added items never enter this arithmetic.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::budget::tariff::{resolve_tariff, ResolvedTariff};
use crate::budget::BudgetSummary;
use crate::domain::catalog::{CatalogItem, CatalogPool};
use crate::domain::proposal::{ProductSelection, SelectedProduct, ValueAddedItem};

pub const MAX_MANDATORY_PRODUCTS: usize = 30;
pub const DEFAULT_VALUE_ADDED_TARGET: usize = 18;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub item: CatalogItem,
    pub pool: CatalogPool,
    pub tariff: ResolvedTariff,
    /// Hours proposed by the selection stage, if any.
    pub suggested_hours: Option<u32>,
}

impl Candidate {
    /// `None` when the item is not a mandatory/priority item or carries no
    /// positive tariff.
    pub fn from_catalog(item: CatalogItem, suggested_hours: Option<u32>) -> Option<Self> {
        let pool = item.pool()?;
        if !matches!(pool, CatalogPool::Mandatory | CatalogPool::Priority) {
            return None;
        }
        let tariff = resolve_tariff(&item)?;
        Some(Self { item, pool, tariff, suggested_hours })
    }
}

/// What a policy sees besides the candidate itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationContext {
    pub annual_budget: Decimal,
    /// Position across all candidates, mandatory first. 0 is most relevant.
    pub position: usize,
    pub candidate_count: usize,
}

pub trait HoursPolicy: Send + Sync {
    fn initial_hours(&self, candidate: &Candidate, context: &AllocationContext) -> u32;
}

/// Splits the budget by relevance rank: the candidate at position `p` of `n`
/// gets weight `n - p`, and its share is floored to whole hours.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProportionalHoursPolicy;

impl HoursPolicy for ProportionalHoursPolicy {
    fn initial_hours(&self, candidate: &Candidate, context: &AllocationContext) -> u32 {
        if context.candidate_count == 0 || context.position >= context.candidate_count {
            return 0;
        }
        let count = Decimal::from(context.candidate_count as u64);
        let weight = Decimal::from((context.candidate_count - context.position) as u64);
        let share = count
            .checked_mul(count + Decimal::ONE)
            .and_then(|doubled| doubled.checked_div(Decimal::TWO))
            .and_then(|total_weight| {
                let budget = context.annual_budget;
                budget
                    .checked_mul(weight)
                    .and_then(|scaled| scaled.checked_div(total_weight))
                    .or_else(|| budget.checked_div(total_weight)?.checked_mul(weight))
            });
        match share {
            Some(share) => affordable_hours(share, candidate.tariff.rate),
            None => 0,
        }
    }
}

/// Trusts the hours the selection stage proposed and falls back to
/// [`ProportionalHoursPolicy`] for candidates without a proposal.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuggestedHoursPolicy;

impl HoursPolicy for SuggestedHoursPolicy {
    fn initial_hours(&self, candidate: &Candidate, context: &AllocationContext) -> u32 {
        match candidate.suggested_hours.filter(|hours| *hours > 0) {
            Some(hours) => hours,
            None => ProportionalHoursPolicy.initial_hours(candidate, context),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursPolicyKind {
    #[default]
    Proportional,
    Suggested,
}

impl HoursPolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proportional => "proportional",
            Self::Suggested => "suggested",
        }
    }

    pub fn policy(self) -> Box<dyn HoursPolicy> {
        match self {
            Self::Proportional => Box::new(ProportionalHoursPolicy),
            Self::Suggested => Box::new(SuggestedHoursPolicy),
        }
    }
}

impl fmt::Display for HoursPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HoursPolicyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "proportional" => Ok(Self::Proportional),
            "suggested" => Ok(Self::Suggested),
            _ => Err(format!("unsupported hours policy `{value}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationLimits {
    pub mandatory_cap: usize,
    pub value_added_target: usize,
}

impl Default for AllocationLimits {
    fn default() -> Self {
        Self {
            mandatory_cap: MAX_MANDATORY_PRODUCTS,
            value_added_target: DEFAULT_VALUE_ADDED_TARGET,
        }
    }
}

#[derive(Clone, Debug)]
struct Line {
    candidate: Candidate,
    hours: u32,
}

impl Line {
    fn subtotal(&self) -> Decimal {
        cost(self.candidate.tariff.rate, self.hours)
    }
}

/// Assigns hours to mandatory and priority candidates so that the summed
/// subtotals never exceed `annual_budget`. Mandatory candidates beyond the
/// cap (never more than 30) are ignored.
pub fn allocate(
    annual_budget: Decimal,
    mut mandatory: Vec<Candidate>,
    priority: Vec<Candidate>,
    limits: AllocationLimits,
    policy: &dyn HoursPolicy,
) -> ProductSelection {
    mandatory.truncate(limits.mandatory_cap.min(MAX_MANDATORY_PRODUCTS));
    let mandatory_len = mandatory.len();
    let candidate_count = mandatory_len + priority.len();

    let mut lines = mandatory
        .into_iter()
        .chain(priority)
        .enumerate()
        .map(|(position, candidate)| {
            let context = AllocationContext { annual_budget, position, candidate_count };
            let hours = policy.initial_hours(&candidate, &context);
            Line { candidate, hours }
        })
        .collect::<Vec<_>>();

    descend(&mut lines, mandatory_len, annual_budget);
    fill(&mut lines, annual_budget);

    let mut mandatory_products = Vec::new();
    let mut priority_products = Vec::new();
    for (index, line) in lines.into_iter().enumerate() {
        if line.hours == 0 {
            continue;
        }
        let product =
            SelectedProduct::from_catalog(&line.candidate.item, line.candidate.tariff, line.hours);
        if index < mandatory_len {
            mandatory_products.push(product);
        } else {
            priority_products.push(product);
        }
    }

    let total_mandatory = mandatory_products.iter().map(|product| product.subtotal).sum();
    let total_priority = priority_products.iter().map(|product| product.subtotal).sum();

    ProductSelection {
        mandatory_products,
        priority_products,
        value_added: Vec::new(),
        summary: BudgetSummary::from_totals(annual_budget, total_mandatory, total_priority),
    }
}

/// Removes hours until the total fits: priority lines first, then mandatory,
/// least relevant first within each pool.
fn descend(lines: &mut [Line], mandatory_len: usize, annual_budget: Decimal) {
    let order = (mandatory_len..lines.len()).rev().chain((0..mandatory_len).rev());
    for index in order {
        let total = total_of(lines);
        if total <= annual_budget {
            return;
        }
        let line = &mut lines[index];
        if line.hours == 0 {
            continue;
        }
        let excess = total - annual_budget;
        let needed = excess
            .checked_div(line.candidate.tariff.rate)
            .and_then(|hours| hours.ceil().to_u32())
            .unwrap_or(u32::MAX);
        line.hours -= needed.min(line.hours);
    }
}

/// Spends the remaining budget in whole hours, most relevant first. Lines
/// left at zero hours get a single hour first when it still fits.
fn fill(lines: &mut [Line], annual_budget: Decimal) {
    let mut remaining = annual_budget - total_of(lines);
    if remaining <= Decimal::ZERO {
        return;
    }

    for line in lines.iter_mut().filter(|line| line.hours == 0) {
        if line.candidate.tariff.rate <= remaining {
            line.hours = 1;
            remaining -= line.candidate.tariff.rate;
        }
    }

    for line in lines.iter_mut().filter(|line| line.hours > 0) {
        let extra = affordable_hours(remaining, line.candidate.tariff.rate);
        let added = line.hours.checked_add(extra).map_or(0, |_| extra);
        line.hours += added;
        remaining -= cost(line.candidate.tariff.rate, added);
    }
}

/// Saturates at `Decimal::MAX`; the descent then cuts the line to zero.
fn total_of(lines: &[Line]) -> Decimal {
    lines.iter().fold(Decimal::ZERO, |total, line| {
        total.checked_add(line.subtotal()).unwrap_or(Decimal::MAX)
    })
}

fn cost(rate: Decimal, hours: u32) -> Decimal {
    rate.checked_mul(Decimal::from(hours)).unwrap_or(Decimal::MAX)
}

/// Whole hours of `rate` that fit in `amount`, saturating at `u32::MAX` when
/// the rate is too small to divide by.
fn affordable_hours(amount: Decimal, rate: Decimal) -> u32 {
    if amount <= Decimal::ZERO || rate <= Decimal::ZERO {
        return 0;
    }
    amount
        .checked_div(rate)
        .map_or(u32::MAX, |hours| hours.floor().to_u32().unwrap_or(u32::MAX))
}

/// Keeps the value-added items of `chosen` in order without duplicates,
/// truncated to `target`. Items from other pools are skipped.
pub fn select_value_added(chosen: &[CatalogItem], target: usize) -> Vec<ValueAddedItem> {
    let mut seen = HashSet::new();
    chosen
        .iter()
        .filter(|item| item.pool() == Some(CatalogPool::ValueAdded))
        .filter(|item| seen.insert(identity(item)))
        .take(target)
        .map(ValueAddedItem::from_catalog)
        .collect()
}

fn identity(item: &CatalogItem) -> (String, String, String, String) {
    (
        item.category.to_lowercase(),
        item.description.to_lowercase(),
        item.subcategory.to_lowercase(),
        item.theme.to_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        allocate, select_value_added, AllocationContext, AllocationLimits, Candidate,
        HoursPolicy, HoursPolicyKind, ProportionalHoursPolicy, SuggestedHoursPolicy,
    };
    use crate::domain::catalog::CatalogItem;

    fn catalog_item(category: &str, description: &str, rate: i64) -> CatalogItem {
        CatalogItem {
            category: category.to_string(),
            description: description.to_string(),
            basic_ally_rate: Some(Decimal::from(rate)),
            ..CatalogItem::default()
        }
    }

    fn candidate(category: &str, description: &str, rate: i64, hours: Option<u32>) -> Candidate {
        Candidate::from_catalog(catalog_item(category, description, rate), hours)
            .expect("budgetable candidate")
    }

    /// Always asks for a fixed number of hours, regardless of budget.
    struct FixedHours(u32);

    impl HoursPolicy for FixedHours {
        fn initial_hours(&self, _candidate: &Candidate, _context: &AllocationContext) -> u32 {
            self.0
        }
    }

    fn budget() -> Decimal {
        Decimal::from(19_200_000)
    }

    #[test]
    fn candidates_require_budgetable_pool_and_tariff() {
        assert!(Candidate::from_catalog(catalog_item("VALOR AGREGADO", "x", 10), None).is_none());
        assert!(Candidate::from_catalog(catalog_item("Profesionales", "x", 10), None).is_none());
        assert!(Candidate::from_catalog(catalog_item("DIFERENCIAL", "x", 0), None).is_none());
        assert!(Candidate::from_catalog(catalog_item("HIGIENE", "x", 10), None).is_some());
    }

    #[test]
    fn proportional_allocation_stays_within_budget() {
        let mandatory = (0..5)
            .map(|index| candidate("DIFERENCIAL", &format!("dif-{index}"), 95_000, None))
            .collect::<Vec<_>>();
        let priority = (0..8)
            .map(|index| candidate("HIGIENE", &format!("hig-{index}"), 130_000, None))
            .collect::<Vec<_>>();

        let selection = allocate(
            budget(),
            mandatory,
            priority,
            AllocationLimits::default(),
            &ProportionalHoursPolicy,
        );
        let summary = &selection.summary;

        assert!(summary.total_products <= budget());
        assert_eq!(summary.total_mandatory + summary.total_priority, summary.total_products);
        assert!(summary.remaining_balance < Decimal::from(95_000));
        assert!(summary.utilization_percent > Decimal::from(99));
        for product in selection.mandatory_products.iter().chain(&selection.priority_products) {
            assert!(product.hours_assigned > 0);
            assert_eq!(product.subtotal, product.hourly_rate * Decimal::from(product.hours_assigned));
        }
    }

    #[test]
    fn descent_cuts_priority_before_mandatory() {
        let mandatory = vec![candidate("DIFERENCIAL", "dif", 100_000, None)];
        let priority = vec![
            candidate("HIGIENE", "hig-a", 100_000, None),
            candidate("Vacunación", "vac-b", 100_000, None),
        ];

        let selection = allocate(
            budget(),
            mandatory,
            priority,
            AllocationLimits::default(),
            &FixedHours(100),
        );

        assert_eq!(selection.summary.total_products, budget());
        assert_eq!(selection.mandatory_products.len(), 1);
        assert_eq!(selection.mandatory_products[0].hours_assigned, 100);
        assert_eq!(selection.priority_products.len(), 1);
        assert_eq!(selection.priority_products[0].description, "hig-a");
        assert_eq!(selection.priority_products[0].hours_assigned, 92);
    }

    #[test]
    fn descent_reaches_mandatory_when_priority_is_exhausted() {
        let mandatory = vec![candidate("DIFERENCIAL", "dif", 100_000, None)];
        let priority = vec![candidate("HIGIENE", "hig", 100_000, None)];

        let selection = allocate(
            budget(),
            mandatory,
            priority,
            AllocationLimits::default(),
            &FixedHours(300),
        );

        assert!(selection.priority_products.is_empty());
        assert_eq!(selection.mandatory_products[0].hours_assigned, 192);
        assert_eq!(selection.summary.total_products, budget());
    }

    #[test]
    fn mandatory_list_is_capped() {
        let mandatory = (0..40)
            .map(|index| candidate("DIFERENCIAL", &format!("dif-{index}"), 10_000, None))
            .collect::<Vec<_>>();

        let selection = allocate(
            budget(),
            mandatory.clone(),
            Vec::new(),
            AllocationLimits::default(),
            &ProportionalHoursPolicy,
        );
        assert!(selection.mandatory_products.len() <= 30);

        let limits = AllocationLimits { mandatory_cap: 45, ..AllocationLimits::default() };
        let selection = allocate(budget(), mandatory, Vec::new(), limits, &ProportionalHoursPolicy);
        assert!(selection.mandatory_products.len() <= 30);
    }

    #[test]
    fn unaffordable_items_are_dropped() {
        let mandatory = vec![candidate("DIFERENCIAL", "dif", 50_000_000, None)];
        let selection = allocate(
            budget(),
            mandatory,
            Vec::new(),
            AllocationLimits::default(),
            &ProportionalHoursPolicy,
        );
        assert!(selection.mandatory_products.is_empty());
        assert_eq!(selection.summary.total_products, Decimal::ZERO);
        assert_eq!(selection.summary.utilization_percent, Decimal::ZERO);
    }

    #[test]
    fn zero_budget_selects_nothing() {
        let mandatory = vec![candidate("DIFERENCIAL", "dif", 1_000, Some(5))];
        let selection = allocate(
            Decimal::ZERO,
            mandatory,
            Vec::new(),
            AllocationLimits::default(),
            &SuggestedHoursPolicy,
        );
        assert!(selection.mandatory_products.is_empty());
        assert_eq!(selection.summary.utilization_percent, Decimal::ZERO);
    }

    #[test]
    fn suggested_policy_prefers_stage_hours() {
        let context = AllocationContext {
            annual_budget: budget(),
            position: 0,
            candidate_count: 2,
        };
        let suggested = candidate("HIGIENE", "hig", 100_000, Some(12));
        let unsuggested = candidate("HIGIENE", "hig", 100_000, None);

        assert_eq!(SuggestedHoursPolicy.initial_hours(&suggested, &context), 12);
        assert_eq!(
            SuggestedHoursPolicy.initial_hours(&unsuggested, &context),
            ProportionalHoursPolicy.initial_hours(&unsuggested, &context)
        );
        assert_eq!(ProportionalHoursPolicy.initial_hours(&unsuggested, &context), 128);
    }

    #[test]
    fn policy_kind_parses() {
        assert_eq!("Suggested".parse::<HoursPolicyKind>(), Ok(HoursPolicyKind::Suggested));
        assert!("greedy".parse::<HoursPolicyKind>().is_err());
        assert_eq!(HoursPolicyKind::default().to_string(), "proportional");
    }

    #[test]
    fn value_added_is_deduplicated_and_truncated() {
        let chosen = vec![
            catalog_item("VALOR AGREGADO", "charla", 40_000),
            catalog_item("VALOR AGREGADO", "charla", 40_000),
            catalog_item("DIFERENCIAL", "not value added", 40_000),
        ];
        let items = select_value_added(&chosen, 18);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "charla");
        assert_eq!(items[0].reference_rate, Decimal::from(40_000));

        let pool = (0..30)
            .map(|index| catalog_item("VALOR AGREGADO", &format!("va-{index}"), 0))
            .collect::<Vec<_>>();
        let items = select_value_added(&pool, 18);
        assert_eq!(items.len(), 18);
        assert_eq!(items[17].description, "va-17");
        assert_eq!(items[1].reference_rate, Decimal::ZERO);
    }

    #[test]
    fn rates_too_small_to_divide_by_do_not_overflow() {
        let tiny = CatalogItem {
            category: "DIFERENCIAL".to_string(),
            description: "tarifa simbólica".to_string(),
            basic_ally_rate: Some(Decimal::new(1, 22)),
            ..CatalogItem::default()
        };
        let tiny = Candidate::from_catalog(tiny, None).expect("positive tariff");

        let selection = allocate(
            budget(),
            vec![tiny.clone()],
            Vec::new(),
            AllocationLimits::default(),
            &ProportionalHoursPolicy,
        );
        assert_eq!(selection.mandatory_products.len(), 1);
        assert_eq!(selection.mandatory_products[0].hours_assigned, u32::MAX);
        assert!(selection.summary.total_products <= budget());

        let mut priority = tiny;
        priority.pool = crate::domain::catalog::CatalogPool::Priority;
        let selection = allocate(
            budget(),
            vec![candidate("DIFERENCIAL", "dif", 100_000, None)],
            vec![priority],
            AllocationLimits::default(),
            &FixedHours(300),
        );
        assert!(selection.priority_products.is_empty());
        assert_eq!(selection.mandatory_products[0].hours_assigned, 192);
        assert_eq!(selection.summary.total_products, budget());
    }
}

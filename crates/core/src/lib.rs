pub mod audit;
pub mod budget;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use budget::allocation::{
    allocate, select_value_added, AllocationLimits, Candidate, HoursPolicy, HoursPolicyKind,
    ProportionalHoursPolicy, SuggestedHoursPolicy,
};
pub use budget::tariff::{resolve_tariff, ResolvedTariff, TariffField};
pub use budget::{annual_budget, BudgetSummary};
pub use catalog::{CatalogError, CatalogSource, StaticCatalogSource};
pub use domain::catalog::{CatalogItem, CatalogPool, ProgramCategory};
pub use domain::intake::{missing_fields_message, IntakeDraft, IntakeField, IntakeRecord};
pub use domain::proposal::{
    ProductSelection, ProposalDocument, ProposalMetadata, SelectedProduct, ValueAddedItem,
};
pub use domain::risk::RiskProfile;
pub use errors::{ApplicationError, DomainError, InterfaceError};

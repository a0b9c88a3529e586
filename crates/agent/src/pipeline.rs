//! Sequences the four stages, the deterministic budget and the renderer.
//! Every run ends in a [`PipelineOutcome`]; no error escapes `run`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use propuesta_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use propuesta_core::budget::allocation::{AllocationLimits, HoursPolicyKind};
use propuesta_core::budget::annual_budget;
use propuesta_core::config::AppConfig;
use propuesta_core::domain::intake::{missing_fields_message, IntakeDraft, IntakeField};
use propuesta_core::domain::proposal::ProposalDocument;
use propuesta_core::errors::{ApplicationError, DomainError};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::CatalogCache;
use crate::guardrails::EchoPolicy;
use crate::llm::GenerativeClient;
use crate::stages::product_selector::SelectorInput;
use crate::stages::recollector::RecollectorNextStep;
use crate::stages::risk_profiler::RiskNextStep;
use crate::stages::{
    documenter, product_selector, recollector, risk_profiler, PipelineStage, StageContext,
    StageError, StageSettings,
};

pub const REASON_MISSING_FIELDS: &str = "missing_fields";
pub const REASON_RISK_UNDETERMINED: &str = "risk_profile_undetermined";
pub const REASON_BUDGET_INVARIANT: &str = "budget_invariant";
pub const REASON_RENDERING_FAILED: &str = "rendering_failed";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("document converter failed: {0}")]
    Converter(String),
    #[error("no document converter available")]
    ConverterUnavailable,
    #[error("renderer i/o failed: {0}")]
    Io(String),
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, document: &ProposalDocument) -> Result<RenderedDocument, RenderError>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineSettings {
    pub stage: StageSettings,
    pub max_candidates: usize,
    pub limits: AllocationLimits,
    pub hours_policy: HoursPolicyKind,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage: StageSettings::default(),
            max_candidates: 80,
            limits: AllocationLimits::default(),
            hours_policy: HoursPolicyKind::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            stage: StageSettings {
                temperature: config.llm.temperature,
                selector_temperature: config.llm.selector_temperature,
                max_output_tokens: config.llm.max_output_tokens,
            },
            max_candidates: config.catalog.max_candidates,
            limits: AllocationLimits {
                mandatory_cap: config.allocation.mandatory_cap,
                value_added_target: config.allocation.value_added_target,
            },
            hours_policy: config.allocation.hours_policy,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSuccess {
    pub correlation_id: String,
    pub document: ProposalDocument,
    pub rendered: RenderedDocument,
}

impl PipelineSuccess {
    pub fn rendered_len(&self) -> usize {
        self.rendered.bytes.len()
    }
}

/// The single normalized failure shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineFailure {
    pub correlation_id: String,
    pub stage: PipelineStage,
    pub reason: String,
    pub detail: String,
    /// Set only for the missing-fields short-circuit.
    pub missing_fields: Vec<IntakeField>,
    pub message: Option<String>,
}

impl PipelineFailure {
    fn new(
        correlation_id: &str,
        stage: PipelineStage,
        reason: &str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            stage,
            reason: reason.to_string(),
            detail: detail.into(),
            missing_fields: Vec::new(),
            message: None,
        }
    }

    fn missing(
        correlation_id: &str,
        stage: PipelineStage,
        fields: Vec<IntakeField>,
        message: String,
    ) -> Self {
        Self {
            missing_fields: fields,
            message: Some(message.clone()),
            ..Self::new(correlation_id, stage, REASON_MISSING_FIELDS, message)
        }
    }

    pub fn is_missing_fields(&self) -> bool {
        self.reason == REASON_MISSING_FIELDS
    }

    pub fn missing_field_names(&self) -> Vec<&'static str> {
        self.missing_fields.iter().map(|field| field.wire_name()).collect()
    }

    pub fn to_application_error(&self) -> ApplicationError {
        let detail = format!("{}: {}", self.stage, self.detail);
        match self.reason.as_str() {
            REASON_MISSING_FIELDS => {
                DomainError::MissingIntakeFields(self.missing_fields.clone()).into()
            }
            "generation_failed" => ApplicationError::Generative(detail),
            REASON_RENDERING_FAILED => ApplicationError::Rendering(detail),
            REASON_BUDGET_INVARIANT => DomainError::InvariantViolation(detail).into(),
            _ => DomainError::SchemaMismatch {
                stage: self.stage.to_string(),
                detail: self.detail.clone(),
            }
            .into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed(Box<PipelineSuccess>),
    Failed(PipelineFailure),
}

impl PipelineOutcome {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Completed(success) => &success.correlation_id,
            Self::Failed(failure) => &failure.correlation_id,
        }
    }
}

pub struct ProposalPipeline {
    client: Arc<dyn GenerativeClient>,
    catalog: Arc<CatalogCache>,
    renderer: Arc<dyn DocumentRenderer>,
    audit: Arc<dyn AuditSink>,
    settings: PipelineSettings,
    echo_policy: EchoPolicy,
    generation_date: Option<NaiveDate>,
}

impl ProposalPipeline {
    pub fn new(
        client: Arc<dyn GenerativeClient>,
        catalog: Arc<CatalogCache>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            client,
            catalog,
            renderer,
            audit: Arc::new(NoopAuditSink),
            settings: PipelineSettings::default(),
            echo_policy: EchoPolicy::default(),
            generation_date: None,
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_echo_policy(mut self, echo_policy: EchoPolicy) -> Self {
        self.echo_policy = echo_policy;
        self
    }

    /// Pins the metadata date instead of using the local date.
    pub fn with_generation_date(mut self, date: NaiveDate) -> Self {
        self.generation_date = Some(date);
        self
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    pub fn renderer(&self) -> &dyn DocumentRenderer {
        self.renderer.as_ref()
    }

    pub async fn run(&self, draft: IntakeDraft) -> PipelineOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(
            event_name = "pipeline.started",
            correlation_id = %correlation_id,
            company = draft.company_name.as_deref().unwrap_or_default(),
            "proposal pipeline started"
        );

        match self.execute(&correlation_id, draft).await {
            Ok(success) => {
                info!(
                    event_name = "pipeline.completed",
                    correlation_id = %correlation_id,
                    rendered_bytes = success.rendered_len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "proposal pipeline completed"
                );
                PipelineOutcome::Completed(Box::new(success))
            }
            Err(failure) => {
                if failure.is_missing_fields() {
                    info!(
                        event_name = "pipeline.short_circuit",
                        correlation_id = %correlation_id,
                        stage = failure.stage.as_str(),
                        missing = ?failure.missing_field_names(),
                        "intake incomplete, pipeline stopped"
                    );
                } else {
                    error!(
                        event_name = "pipeline.failed",
                        correlation_id = %correlation_id,
                        stage = failure.stage.as_str(),
                        reason = %failure.reason,
                        detail = %failure.detail,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "proposal pipeline failed"
                    );
                }
                PipelineOutcome::Failed(failure)
            }
        }
    }

    async fn execute(
        &self,
        correlation_id: &str,
        draft: IntakeDraft,
    ) -> Result<PipelineSuccess, PipelineFailure> {
        let context = StageContext {
            correlation_id,
            client: self.client.as_ref(),
            settings: self.settings.stage,
        };

        self.stage_started(correlation_id, PipelineStage::Recollector);
        let intake = recollector::run(&context, &draft)
            .await
            .map_err(|error| self.stage_failed(correlation_id, PipelineStage::Recollector, error))?;
        if intake.next_step == RecollectorNextStep::RequestMissingFields {
            self.emit(
                stage_event(
                    correlation_id,
                    PipelineStage::Recollector,
                    "intake.missing_fields",
                    AuditCategory::Intake,
                    AuditOutcome::Rejected,
                )
                .with_metadata("missing", join_names(&intake.missing_fields)),
            );
            return Err(PipelineFailure::missing(
                correlation_id,
                PipelineStage::Recollector,
                intake.missing_fields,
                intake.message,
            ));
        }
        let record = draft.into_record().map_err(|error| match error {
            DomainError::MissingIntakeFields(fields) => {
                let message = missing_fields_message(&fields);
                PipelineFailure::missing(correlation_id, PipelineStage::Intake, fields, message)
            }
            other => PipelineFailure::new(
                correlation_id,
                PipelineStage::Intake,
                "invalid_intake",
                other.to_string(),
            ),
        })?;
        self.stage_completed(correlation_id, PipelineStage::Recollector);

        self.stage_started(correlation_id, PipelineStage::RiskProfiler);
        let assessment = risk_profiler::run(&context, &record)
            .await
            .map_err(|error| self.stage_failed(correlation_id, PipelineStage::RiskProfiler, error))?;
        if assessment.next_step == RiskNextStep::ProfilingError {
            self.emit(
                stage_event(
                    correlation_id,
                    PipelineStage::RiskProfiler,
                    "pipeline.risk_undetermined",
                    AuditCategory::Stage,
                    AuditOutcome::Rejected,
                ),
            );
            return Err(PipelineFailure::new(
                correlation_id,
                PipelineStage::RiskProfiler,
                REASON_RISK_UNDETERMINED,
                "risk profile undetermined",
            ));
        }
        self.stage_completed(correlation_id, PipelineStage::RiskProfiler);

        let budget = annual_budget(&record).map_err(|error| {
            self.invariant_failed(correlation_id, error.to_string())
        })?;
        self.emit(
            stage_event(
                correlation_id,
                PipelineStage::Budget,
                "budget.computed",
                AuditCategory::Budget,
                AuditOutcome::Success,
            )
            .with_metadata("annual_budget", budget.to_string()),
        );

        let catalog = self.catalog.items().await;
        if catalog.is_empty() {
            warn!(
                event_name = "pipeline.catalog.empty",
                correlation_id,
                "catalog has no items; selection will be empty"
            );
        }

        self.stage_started(correlation_id, PipelineStage::ProductSelector);
        let policy = self.settings.hours_policy.policy();
        let input = SelectorInput {
            record: &record,
            risk_profile: &assessment.profile,
            annual_budget: budget,
            catalog: catalog.as_slice(),
            max_candidates: self.settings.max_candidates,
            limits: self.settings.limits,
            policy: policy.as_ref(),
        };
        let selection = product_selector::run(&context, &input).await.map_err(|error| {
            self.stage_failed(correlation_id, PipelineStage::ProductSelector, error)
        })?;
        if !selection.summary.within_budget() {
            return Err(self.invariant_failed(
                correlation_id,
                format!(
                    "total_products {} exceeds annual budget {}",
                    selection.summary.total_products, selection.summary.annual_budget
                ),
            ));
        }
        self.emit(
            stage_event(
                correlation_id,
                PipelineStage::ProductSelector,
                "budget.allocated",
                AuditCategory::Budget,
                AuditOutcome::Success,
            )
            .with_metadata("total_products", selection.summary.total_products.to_string())
            .with_metadata("utilization_percent", selection.summary.utilization_percent.to_string())
            .with_metadata("hours_policy", self.settings.hours_policy.as_str()),
        );
        self.stage_completed(correlation_id, PipelineStage::ProductSelector);

        let generated_on = self.generation_date.unwrap_or_else(|| Local::now().date_naive());
        let expected =
            ProposalDocument::assemble(&record, &assessment.profile, &selection, generated_on);

        self.stage_started(correlation_id, PipelineStage::Documenter);
        let document = documenter::run(&context, &expected, &self.echo_policy)
            .await
            .map_err(|error| self.stage_failed(correlation_id, PipelineStage::Documenter, error))?;
        self.stage_completed(correlation_id, PipelineStage::Documenter);

        self.stage_started(correlation_id, PipelineStage::Rendering);
        let rendered = self.renderer.render(&document).await.map_err(|error| {
            self.emit(
                stage_event(
                    correlation_id,
                    PipelineStage::Rendering,
                    "rendering.failed",
                    AuditCategory::Rendering,
                    AuditOutcome::Failed,
                )
                .with_metadata("error", error.to_string()),
            );
            PipelineFailure::new(
                correlation_id,
                PipelineStage::Rendering,
                REASON_RENDERING_FAILED,
                error.to_string(),
            )
        })?;
        self.emit(
            stage_event(
                correlation_id,
                PipelineStage::Rendering,
                "rendering.completed",
                AuditCategory::Rendering,
                AuditOutcome::Success,
            )
            .with_metadata("bytes", rendered.bytes.len().to_string())
            .with_metadata("content_type", rendered.content_type.clone()),
        );

        Ok(PipelineSuccess { correlation_id: correlation_id.to_string(), document, rendered })
    }

    fn stage_started(&self, correlation_id: &str, stage: PipelineStage) {
        info!(
            event_name = "pipeline.stage.started",
            correlation_id,
            stage = stage.as_str(),
            "stage started"
        );
    }

    fn stage_completed(&self, correlation_id: &str, stage: PipelineStage) {
        info!(
            event_name = "pipeline.stage.completed",
            correlation_id,
            stage = stage.as_str(),
            "stage completed"
        );
        self.emit(
            stage_event(
                correlation_id,
                stage,
                "pipeline.stage.completed",
                AuditCategory::Stage,
                AuditOutcome::Success,
            ),
        );
    }

    fn stage_failed(&self, correlation_id: &str, stage: PipelineStage, error: StageError) -> PipelineFailure {
        self.emit(
            stage_event(
                correlation_id,
                stage,
                "pipeline.stage.failed",
                AuditCategory::Stage,
                AuditOutcome::Failed,
            )
            .with_metadata("reason", error.reason()),
        );
        PipelineFailure::new(correlation_id, stage, error.reason(), error.to_string())
    }

    fn invariant_failed(&self, correlation_id: &str, detail: String) -> PipelineFailure {
        self.emit(
            stage_event(
                correlation_id,
                PipelineStage::Budget,
                "budget.invariant_violated",
                AuditCategory::Budget,
                AuditOutcome::Failed,
            )
            .with_metadata("detail", detail.clone()),
        );
        PipelineFailure::new(correlation_id, PipelineStage::Budget, REASON_BUDGET_INVARIANT, detail)
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.emit(event);
    }
}

fn stage_event(
    correlation_id: &str,
    stage: PipelineStage,
    event_type: &str,
    category: AuditCategory,
    outcome: AuditOutcome,
) -> AuditEvent {
    AuditEvent::new(correlation_id, event_type, category, outcome).for_stage(stage.as_str())
}

fn join_names(fields: &[IntakeField]) -> String {
    fields.iter().map(|field| field.wire_name()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use propuesta_core::domain::intake::IntakeField;
    use propuesta_core::errors::{ApplicationError, DomainError};

    use super::{PipelineFailure, PipelineStage, REASON_MISSING_FIELDS};

    #[test]
    fn missing_field_failures_map_to_domain_errors() {
        let failure = PipelineFailure::missing(
            "run-1",
            PipelineStage::Recollector,
            vec![IntakeField::CompanyName],
            "Faltan datos".to_string(),
        );

        assert_eq!(failure.reason, REASON_MISSING_FIELDS);
        assert_eq!(failure.missing_field_names(), vec!["nombre_empresa"]);
        assert_eq!(failure.message.as_deref(), Some("Faltan datos"));
        assert_eq!(
            failure.to_application_error(),
            ApplicationError::Domain(DomainError::MissingIntakeFields(vec![IntakeField::CompanyName]))
        );
    }

    #[test]
    fn stage_failures_map_by_reason() {
        let generation =
            PipelineFailure::new("run-2", PipelineStage::RiskProfiler, "generation_failed", "timeout");
        assert_eq!(
            generation.to_application_error(),
            ApplicationError::Generative("risk_profiler: timeout".to_string())
        );

        let drift =
            PipelineFailure::new("run-3", PipelineStage::Documenter, "documenter_drift", "presupuesto");
        assert!(matches!(
            drift.to_application_error(),
            ApplicationError::Domain(DomainError::SchemaMismatch { .. })
        ));
    }
}

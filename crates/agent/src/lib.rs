//! Generative side of the proposal pipeline.
//!
//! The generative capability only proposes: it validates intake, profiles
//! risk, picks catalog references and consolidates the document. Budget
//! arithmetic, hour allocation and the final numbers are decided by
//! `propuesta-core`, and the consolidation stage is checked to echo them.
//!
//! - `llm` / `providers`: the `GenerativeClient` seam, HTTP backends and
//!   the timeout/retry wrapper
//! - `coercion`: recovery-oriented parsing of raw output
//! - `stages`: the four stage contracts with schema validation
//! - `guardrails`: the consolidation echo check
//! - `catalog`: the shared catalog snapshot
//! - `pipeline`: the orchestrator

pub mod catalog;
pub mod coercion;
pub mod guardrails;
pub mod llm;
pub mod pipeline;
pub mod providers;
pub mod stages;

pub use catalog::CatalogCache;
pub use llm::{GenerationError, GenerationRequest, GenerativeClient, ResilientClient, ScriptedClient};
pub use pipeline::{
    DocumentRenderer, PipelineFailure, PipelineOutcome, PipelineSettings, PipelineSuccess,
    ProposalPipeline, RenderError, RenderedDocument,
};
pub use stages::{PipelineStage, StageError, StageSettings};

use std::sync::Arc;

use axum::Router;
use propuesta_agent::providers::client_from_config;
use propuesta_agent::{
    CatalogCache, GenerationError, GenerativeClient, PipelineSettings, ProposalPipeline,
};
use propuesta_core::catalog::CatalogError;
use propuesta_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

use crate::catalog::HttpCatalogSource;
use crate::pdf::{PdfError, PdfGenerator};
use crate::telemetry::TracingAuditSink;
use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub pipeline: Arc<ProposalPipeline>,
    pub catalog: Arc<CatalogCache>,
    pub renderer: Arc<PdfGenerator>,
}

impl Application {
    /// Every HTTP route the service exposes.
    pub fn router(&self) -> Router {
        api::router(Arc::clone(&self.pipeline)).merge(health::router())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("generative backend setup failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("catalog client setup failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("document renderer setup failed: {0}")]
    Renderer(#[from] PdfError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;
    let client = client_from_config(&config.llm)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "generative backend configured"
    );
    assemble(config, client)
}

/// Wires the pipeline around an already built generative client.
pub fn assemble(
    config: AppConfig,
    client: Arc<dyn GenerativeClient>,
) -> Result<Application, BootstrapError> {
    let source = HttpCatalogSource::from_config(&config.catalog)?;
    let catalog = Arc::new(CatalogCache::new(Arc::new(source)));
    let renderer = Arc::new(PdfGenerator::from_config(&config.pdf)?);
    info!(
        event_name = "system.bootstrap.renderer_ready",
        correlation_id = "bootstrap",
        converter = renderer.converter_path().is_some(),
        html_fallback = config.pdf.allow_html_fallback,
        "document renderer configured"
    );

    let pipeline = ProposalPipeline::new(client, Arc::clone(&catalog), renderer.clone())
        .with_settings(PipelineSettings::from_config(&config))
        .with_audit_sink(Arc::new(TracingAuditSink));

    Ok(Application { config, pipeline: Arc::new(pipeline), catalog, renderer })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use propuesta_agent::ScriptedClient;
    use propuesta_core::config::{AppConfig, LlmProvider};
    use tower::ServiceExt;

    use super::{assemble, bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_requires_an_api_key_for_gemini() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Gemini;
        config.llm.api_key = None;

        let error = bootstrap_with_config(config).await.err().expect("missing key");
        assert!(matches!(error, BootstrapError::Config(_) | BootstrapError::Generation(_)));
    }

    #[tokio::test]
    async fn bootstrap_wires_an_ollama_backend() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;
        config.llm.api_key = None;
        config.llm.base_url = Some("http://127.0.0.1:11434/v1".to_string());

        let app = bootstrap_with_config(config).await.expect("bootstrap");
        assert!(app.catalog.cached().is_none());
        assert_eq!(app.config.llm.provider, LlmProvider::Ollama);
    }

    #[tokio::test]
    async fn assembled_router_serves_health_and_api() {
        let client = ScriptedClient::by_label(Vec::<(String, String)>::new());
        let app = assemble(AppConfig::default(), Arc::new(client)).expect("assemble");

        let health = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);

        let run = app
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/run")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(run.status(), StatusCode::BAD_REQUEST);
    }
}

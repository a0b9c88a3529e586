//! Proposal HTTP surface: `POST /run` and `POST /generar-pdf`.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use propuesta_agent::{PipelineFailure, PipelineOutcome, ProposalPipeline, RenderedDocument};
use propuesta_core::domain::intake::IntakeDraft;
use propuesta_core::domain::proposal::{CommercialProposal, ProposalDocument, ProposalMetadata};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

pub const MISSING_FIELDS_ERROR: &str = "Campos requeridos faltantes";

#[derive(Clone)]
pub struct ApiState {
    pipeline: Arc<ProposalPipeline>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campos_faltantes: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

impl ApiError {
    fn message(error: impl Into<String>) -> Self {
        Self { error: error.into(), ..Self::default() }
    }

    fn missing_fields(fields: Vec<&'static str>, message: Option<String>) -> Self {
        Self {
            error: MISSING_FIELDS_ERROR.to_string(),
            campos_faltantes: Some(fields),
            mensaje: message,
            ..Self::default()
        }
    }

    fn from_failure(failure: &PipelineFailure) -> Self {
        Self {
            error: failure.to_application_error().to_string(),
            stage: Some(failure.stage.to_string()),
            detail: Some(failure.detail.clone()),
            correlation_id: Some(failure.correlation_id.clone()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunResponse {
    pub status: &'static str,
    pub correlation_id: String,
    pub propuesta: ProposalDocument,
    pub pdf_generado: bool,
    pub pdf_size_bytes: usize,
    pub execution_time_seconds: f64,
    pub timestamp: String,
}

pub fn router(pipeline: Arc<ProposalPipeline>) -> Router {
    Router::new()
        .route("/run", post(run))
        .route("/generar-pdf", post(generate_pdf))
        .with_state(ApiState { pipeline })
}

async fn run(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<RunResponse>> {
    let payload = json_object(&body)?;
    let draft = IntakeDraft::from_json(&Value::Object(payload));

    let missing = draft.missing_fields();
    if !missing.is_empty() {
        let names = missing.iter().map(|field| field.wire_name()).collect::<Vec<_>>();
        info!(
            event_name = "api.run.missing_fields",
            missing = %names.join(","),
            "rejecting intake with missing fields"
        );
        return Err((StatusCode::BAD_REQUEST, Json(ApiError::missing_fields(names, None))));
    }

    let started = Instant::now();
    let outcome = state.pipeline.run(draft).await;
    let execution_time_seconds = started.elapsed().as_secs_f64();

    match outcome {
        PipelineOutcome::Completed(success) => {
            let pdf_size_bytes = success.rendered_len();
            Ok(Json(RunResponse {
                status: "success",
                correlation_id: success.correlation_id,
                propuesta: success.document,
                pdf_generado: true,
                pdf_size_bytes,
                execution_time_seconds,
                timestamp: Local::now().to_rfc3339(),
            }))
        }
        PipelineOutcome::Failed(failure) if failure.is_missing_fields() => {
            let body = ApiError {
                correlation_id: Some(failure.correlation_id.clone()),
                ..ApiError::missing_fields(failure.missing_field_names(), failure.message.clone())
            };
            Err((StatusCode::BAD_REQUEST, Json(body)))
        }
        PipelineOutcome::Failed(failure) => {
            error!(
                event_name = "api.run.failed",
                correlation_id = %failure.correlation_id,
                stage = %failure.stage,
                reason = %failure.reason,
                "proposal pipeline failed"
            );
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::from_failure(&failure))))
        }
    }
}

async fn generate_pdf(State(state): State<ApiState>, body: Bytes) -> ApiResult<Response> {
    let internal =
        |message: String| (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::message(message)));

    let payload = json_object(&body).map_err(|(_, Json(error))| internal(error.error))?;
    let document = proposal_from_payload(payload, Local::now().date_naive()).map_err(internal)?;

    match state.pipeline.renderer().render(&document).await {
        Ok(rendered) => {
            info!(
                event_name = "api.pdf.generated",
                size = rendered.bytes.len(),
                content_type = %rendered.content_type,
                "proposal document rendered"
            );
            Ok(attachment(&document, rendered))
        }
        Err(error) => {
            error!(event_name = "api.pdf.failed", error = %error, "proposal rendering failed");
            Err(internal(format!("Error generando PDF: {error}")))
        }
    }
}

fn json_object(body: &[u8]) -> ApiResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::message("El cuerpo de la solicitud debe ser un objeto JSON")),
        )),
        Err(error) => {
            warn!(event_name = "api.body.malformed", error = %error, "request body is not JSON");
            let message = format!("JSON inválido: {error}");
            Err((StatusCode::BAD_REQUEST, Json(ApiError::message(message))))
        }
    }
}

/// Accepts the wrapped document (`propuesta_comercial` plus optional
/// `metadatos`) or the bare proposal content. Missing metadata is generated
/// for `today`.
pub fn proposal_from_payload(
    mut payload: Map<String, Value>,
    today: NaiveDate,
) -> Result<ProposalDocument, String> {
    let (content, metadata) = match payload.remove("propuesta_comercial") {
        Some(content) => (content, payload.remove("metadatos")),
        None => (Value::Object(payload), None),
    };

    let proposal = serde_json::from_value::<CommercialProposal>(content)
        .map_err(|error| format!("Propuesta inválida: {error}"))?;
    let metadata = match metadata {
        Some(value) => serde_json::from_value::<ProposalMetadata>(value)
            .map_err(|error| format!("Metadatos inválidos: {error}"))?,
        None => ProposalMetadata::generated_on(today),
    };
    Ok(ProposalDocument { proposal, metadata })
}

fn attachment(document: &ProposalDocument, rendered: RenderedDocument) -> Response {
    let filename = document.download_name(&rendered.extension);
    (
        [
            (header::CONTENT_TYPE, rendered.content_type),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        rendered.bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use chrono::NaiveDate;
    use propuesta_agent::coercion::BalancedScanner;
    use propuesta_agent::{
        CatalogCache, DocumentRenderer, GenerationError, GenerationRequest, ProposalPipeline,
        RenderError, RenderedDocument, ScriptedClient,
    };
    use propuesta_core::catalog::StaticCatalogSource;
    use propuesta_core::domain::proposal::ProposalDocument;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{proposal_from_payload, router, MISSING_FIELDS_ERROR};

    struct FixedRenderer;

    #[async_trait]
    impl DocumentRenderer for FixedRenderer {
        async fn render(
            &self,
            document: &ProposalDocument,
        ) -> Result<RenderedDocument, RenderError> {
            Ok(RenderedDocument {
                bytes: format!("%PDF {}", document.proposal.client.nombre_empresa).into_bytes(),
                content_type: "application/pdf".to_string(),
                extension: "pdf".to_string(),
            })
        }
    }

    struct BrokenRenderer;

    #[async_trait]
    impl DocumentRenderer for BrokenRenderer {
        async fn render(
            &self,
            _document: &ProposalDocument,
        ) -> Result<RenderedDocument, RenderError> {
            Err(RenderError::ConverterUnavailable)
        }
    }

    fn acme_intake() -> Value {
        json!({
            "nombre_empresa": "Acme",
            "numero_empleados": 150,
            "codigo_ciiu": "4530",
            "aportes_mensuales": 8000000,
            "porcentaje_reinversion": 20,
            "enfoque_prioritario": "Seguridad",
            "correo_destinatario": "a@b.com"
        })
    }

    fn echo_user_instruction(request: &GenerationRequest) -> Result<String, GenerationError> {
        BalancedScanner::json_object()
            .first_span(&request.user_instruction)
            .map(str::to_string)
            .ok_or(GenerationError::EmptyResponse)
    }

    fn client(recollector: Value) -> ScriptedClient {
        ScriptedClient::new(move |request| match request.label.as_str() {
            "recollector" => Ok(recollector.to_string()),
            "risk_profiler" => Ok(json!({
                "clase_riesgo": "Clase de Riesgo 3",
                "riesgos_generales": ["mecánicos"],
                "obligaciones_legales": ["SG-SST"],
                "proximo_paso": "seleccion_productos"
            })
            .to_string()),
            "documenter" => echo_user_instruction(request),
            other => Err(GenerationError::Configuration(format!("unexpected stage {other}"))),
        })
    }

    fn proceed() -> Value {
        json!({ "datos_faltantes": [], "proximo_paso": "perfilamiento_cliente", "mensaje": "" })
    }

    fn app(client: ScriptedClient, renderer: Arc<dyn DocumentRenderer>) -> Router {
        let catalog = CatalogCache::new(Arc::new(StaticCatalogSource::default()));
        let pipeline = ProposalPipeline::new(Arc::new(client), Arc::new(catalog), renderer)
            .with_generation_date(NaiveDate::from_ymd_opt(2026, 3, 9).expect("date"));
        router(Arc::new(pipeline))
    }

    async fn post(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.into())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, bytes.to_vec(), disposition)
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("json body")
    }

    #[tokio::test]
    async fn run_returns_the_budgeted_proposal() {
        let app = app(client(proceed()), Arc::new(FixedRenderer));

        let (status, body, _) = post(app, "/run", acme_intake().to_string()).await;

        assert_eq!(status, StatusCode::OK);
        let payload = json_body(&body);
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["pdf_generado"], true);
        assert_eq!(payload["pdf_size_bytes"], "%PDF Acme".len());
        assert_eq!(
            payload["propuesta"]["propuesta_comercial"]["presupuesto"]["presupuesto_anual"],
            19_200_000.0
        );
        assert_eq!(payload["propuesta"]["metadatos"]["fecha_generacion"], "2026-03-09");
        assert!(payload["execution_time_seconds"].as_f64().is_some());
        assert!(payload["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn run_without_company_lists_the_missing_field() {
        let client = client(proceed());
        let app = app(client.clone(), Arc::new(FixedRenderer));
        let mut intake = acme_intake();
        intake.as_object_mut().expect("object").remove("nombre_empresa");

        let (status, body, _) = post(app, "/run", intake.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let payload = json_body(&body);
        assert_eq!(payload["error"], MISSING_FIELDS_ERROR);
        assert_eq!(payload["campos_faltantes"], json!(["nombre_empresa"]));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn generative_recollector_request_is_a_bad_request() {
        let recollector = json!({
            "datos_faltantes": ["correo_destinatario"],
            "proximo_paso": "solicitar_datos_faltantes",
            "mensaje": "Revisa el correo"
        });
        let app = app(client(recollector), Arc::new(FixedRenderer));

        let (status, body, _) = post(app, "/run", acme_intake().to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let payload = json_body(&body);
        assert_eq!(payload["campos_faltantes"], json!(["correo_destinatario"]));
        assert!(payload["mensaje"].as_str().is_some_and(|message| !message.is_empty()));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (status, body, _) =
            post(app(client(proceed()), Arc::new(FixedRenderer)), "/run", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"].as_str().is_some());

        let (status, _, _) =
            post(app(client(proceed()), Arc::new(FixedRenderer)), "/run", "[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rendering_fault_is_an_internal_error_with_stage() {
        let app = app(client(proceed()), Arc::new(BrokenRenderer));

        let (status, body, _) = post(app, "/run", acme_intake().to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let payload = json_body(&body);
        assert_eq!(payload["stage"], "rendering");
        assert!(payload["error"].as_str().is_some_and(|error| error.contains("rendering")));
        assert!(payload["correlation_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn generate_pdf_returns_an_attachment() {
        let app = app(client(proceed()), Arc::new(FixedRenderer));
        let (_, body, _) = post(app.clone(), "/run", acme_intake().to_string()).await;
        let proposal = json_body(&body)["propuesta"].clone();

        let (status, bytes, disposition) =
            post(app.clone(), "/generar-pdf", proposal.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"%PDF Acme");
        assert_eq!(disposition, "attachment; filename=\"Propuesta_Acme.pdf\"");

        let bare = proposal["propuesta_comercial"].clone();
        let (status, bytes, _) = post(app, "/generar-pdf", bare.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"%PDF Acme");
    }

    #[tokio::test]
    async fn generate_pdf_reports_invalid_documents() {
        let app = app(client(proceed()), Arc::new(FixedRenderer));

        let (status, body, _) =
            post(app, "/generar-pdf", json!({ "nombre_empresa": "Acme" }).to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let payload = json_body(&body);
        assert!(payload["error"].as_str().is_some_and(|error| error.contains("inválida")));
    }

    #[test]
    fn empty_payload_is_not_a_proposal() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).expect("date");
        let error = proposal_from_payload(serde_json::Map::new(), today).expect_err("empty");
        assert!(error.starts_with("Propuesta inválida"));
    }
}

use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

pub const SERVICE_NAME: &str = "propuesta-server";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Liveness only; collaborators are checked by `propuesta doctor`.
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

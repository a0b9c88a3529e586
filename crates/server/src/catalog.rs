//! HTTP catalog source backed by the external catalog endpoint.

use std::time::Duration;

use async_trait::async_trait;
use propuesta_core::catalog::{CatalogError, CatalogSource};
use propuesta_core::config::CatalogConfig;
use propuesta_core::domain::catalog::CatalogItem;
use serde_json::Value;
use tracing::{debug, warn};

pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
    page: u32,
    page_size: u32,
}

impl HttpCatalogSource {
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CatalogError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            page: config.page,
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("page", self.page), ("pageSize", self.page_size)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|error| CatalogError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status { status: status.as_u16() });
        }

        let payload: Value =
            response.json().await.map_err(|error| CatalogError::Decode(error.to_string()))?;
        Ok(decode_items(payload))
    }
}

/// Accepts `{"items": [...]}` or a bare array; any other shape is an empty
/// catalog. Entries that do not decode as an object are skipped.
pub fn decode_items(payload: Value) -> Vec<CatalogItem> {
    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!(event_name = "catalog.unexpected_shape", "catalog payload has no items list");
                return Vec::new();
            }
        },
        _ => {
            warn!(event_name = "catalog.unexpected_shape", "catalog payload is not a list");
            return Vec::new();
        }
    };

    let total = entries.len();
    let items = entries
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|entry| serde_json::from_value::<CatalogItem>(entry).ok())
        .collect::<Vec<_>>();
    if items.len() < total {
        debug!(skipped = total - items.len(), "catalog entries skipped");
    }
    items
}

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::catalog::CatalogItem;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("catalog responded with status {status}")]
    Status { status: u16 },
    #[error("catalog payload could not be decoded: {0}")]
    Decode(String),
}

/// Read-only provider of catalog items.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Fixed in-process catalog.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalogSource {
    items: Vec<CatalogItem>,
}

impl StaticCatalogSource {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(self.items.clone())
    }
}

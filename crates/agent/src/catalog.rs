//! Process-wide catalog snapshot, fetched lazily and shared read-only.

use std::sync::{Arc, RwLock};

use propuesta_core::catalog::CatalogSource;
use propuesta_core::domain::catalog::{CatalogItem, ProgramCategory};
use tracing::{info, warn};

pub type CatalogSnapshot = Arc<Vec<CatalogItem>>;

pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    snapshot: RwLock<Option<CatalogSnapshot>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source, snapshot: RwLock::new(None) }
    }

    /// Returns the cached snapshot, fetching it on first use. A failed fetch
    /// yields an empty list and leaves the cache empty so the next call
    /// retries.
    pub async fn items(&self) -> CatalogSnapshot {
        if let Some(snapshot) = self.cached() {
            return snapshot;
        }
        self.fetch().await.unwrap_or_default()
    }

    /// Fetches unconditionally and replaces the snapshot on success.
    pub async fn refresh(&self) -> CatalogSnapshot {
        self.fetch().await.unwrap_or_default()
    }

    pub async fn by_category(&self, category: ProgramCategory) -> Vec<CatalogItem> {
        self.items()
            .await
            .iter()
            .filter(|item| item.program_category() == Some(category))
            .cloned()
            .collect()
    }

    pub fn cached(&self) -> Option<CatalogSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn fetch(&self) -> Option<CatalogSnapshot> {
        match self.source.fetch().await {
            Ok(items) => {
                let snapshot = Arc::new(items);
                info!(
                    event_name = "catalog.fetched",
                    items = snapshot.len(),
                    "catalog snapshot loaded"
                );
                match self.snapshot.write() {
                    Ok(mut guard) => *guard = Some(Arc::clone(&snapshot)),
                    Err(poisoned) => *poisoned.into_inner() = Some(Arc::clone(&snapshot)),
                }
                Some(snapshot)
            }
            Err(error) => {
                warn!(
                    event_name = "catalog.fetch_failed",
                    error = %error,
                    "catalog unavailable, continuing with no candidates"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use propuesta_core::catalog::{CatalogError, CatalogSource, StaticCatalogSource};
    use propuesta_core::domain::catalog::{CatalogItem, ProgramCategory};

    use super::CatalogCache;

    fn item(category: &str, description: &str) -> CatalogItem {
        CatalogItem {
            category: category.to_string(),
            description: description.to_string(),
            ..CatalogItem::default()
        }
    }

    /// Fails the first `failures` fetches, then serves one item per call.
    struct FlakySource {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogSource for FlakySource {
        async fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(CatalogError::Status { status: 503 });
            }
            Ok(vec![item("HIGIENE", &format!("item-{call}"))])
        }
    }

    #[tokio::test]
    async fn snapshot_is_fetched_once_and_shared() {
        let source = Arc::new(FlakySource { failures: 0, calls: AtomicUsize::new(0) });
        let cache = CatalogCache::new(source.clone());

        let first = cache.items().await;
        let second = cache.items().await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_empty_and_not_cached() {
        let source = Arc::new(FlakySource { failures: 1, calls: AtomicUsize::new(0) });
        let cache = CatalogCache::new(source.clone());

        assert!(cache.items().await.is_empty());
        assert!(cache.cached().is_none());
        assert_eq!(cache.items().await.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_replaces_the_snapshot() {
        let source = Arc::new(FlakySource { failures: 0, calls: AtomicUsize::new(0) });
        let cache = CatalogCache::new(source);

        assert_eq!(cache.items().await[0].description, "item-0");
        assert_eq!(cache.refresh().await[0].description, "item-1");
        assert_eq!(cache.items().await[0].description, "item-1");
    }

    #[tokio::test]
    async fn by_category_filters_the_snapshot() {
        let cache = CatalogCache::new(Arc::new(StaticCatalogSource::new(vec![
            item("HIGIENE", "ruido"),
            item("Vacunacion", "influenza"),
            item("higiene", "iluminación"),
        ])));

        let hygiene = cache.by_category(ProgramCategory::Hygiene).await;
        assert_eq!(hygiene.len(), 2);
        assert_eq!(cache.by_category(ProgramCategory::Vaccination).await.len(), 1);
    }
}

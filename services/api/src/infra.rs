use appcatalog::catalog::{
    ApplicationService, MemoryCatalogStore, MemorySearchIndex, SeedData,
};
use appcatalog::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type CatalogService = ApplicationService<MemoryCatalogStore, MemorySearchIndex>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Reads the collaborator tables to preload. Without a path the catalog
/// starts with no organizations, users or data sources.
pub(crate) fn load_seed(path: Option<&Path>) -> Result<SeedData, AppError> {
    let Some(path) = path else {
        return Ok(SeedData::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let seed = parse_seed(&raw)?;
    info!(
        path = %path.display(),
        organizations = seed.organizations.len(),
        users = seed.users.len(),
        data_sources = seed.data_sources.len(),
        "catalog seed loaded"
    );
    Ok(seed)
}

pub(crate) fn parse_seed(raw: &str) -> Result<SeedData, AppError> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn build_catalog_service(seed: SeedData) -> Arc<CatalogService> {
    let store = Arc::new(MemoryCatalogStore::from_seed(seed));
    let index = Arc::new(MemorySearchIndex::new());
    Arc::new(ApplicationService::new(store, index))
}

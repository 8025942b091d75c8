//! Infrastructure wiring: pick a document store, then build the services
//! over it and warm the roster index.

use std::sync::Arc;

use gymhub_infra::store::DocumentStore;
use gymhub_infra::{BcryptHasher, InMemoryDocumentStore, InMemoryObjectStorage, ServiceResult, Services};

use crate::config::ApiConfig;

pub async fn build_services(config: &ApiConfig) -> ServiceResult<Services> {
    let store = document_store(config).await?;
    let services = Services::new(
        store,
        Arc::new(BcryptHasher::new(config.bcrypt_cost)),
        Arc::new(InMemoryObjectStorage::new(config.storage_base_url.clone())),
    );
    let gyms = services.warm_up().await?;
    tracing::info!(gyms, "roster index warmed up");
    Ok(services)
}

/// In-memory services with a cheap hash cost, for tests and local runs.
pub fn in_memory_services(bcrypt_cost: u32) -> Services {
    Services::new(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(BcryptHasher::new(bcrypt_cost)),
        Arc::new(InMemoryObjectStorage::new(crate::config::DEFAULT_STORAGE_BASE_URL)),
    )
}

#[cfg(feature = "postgres")]
async fn document_store(config: &ApiConfig) -> ServiceResult<Arc<dyn DocumentStore>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = gymhub_infra::store::PostgresDocumentStore::connect(url).await?;
            tracing::info!("using postgres document store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; falling back to in-memory store");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn document_store(config: &ApiConfig) -> ServiceResult<Arc<dyn DocumentStore>> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
    }
    Ok(Arc::new(InMemoryDocumentStore::new()))
}

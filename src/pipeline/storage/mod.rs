pub mod in_memory;
pub mod rest;
pub mod sqlite;
pub mod traits;

pub use in_memory::InMemoryStorage;
pub use rest::RestStorage;
pub use sqlite::SqliteStorage;
pub use traits::Storage;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{IngestError, Result};
use std::sync::Arc;
use tracing::info;

/// Builds the configured storage backend.
pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    info!("Using {:?} storage backend", config.backend);
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryStorage::new())),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStorage::open(&config.sqlite_path)?)),
        StorageBackend::Rest => {
            let url = config
                .rest_url
                .clone()
                .ok_or_else(|| IngestError::Config("rest backend requires a URL".into()))?;
            let key = config
                .rest_key
                .clone()
                .ok_or_else(|| IngestError::Config("rest backend requires an API key".into()))?;
            Ok(Arc::new(RestStorage::new(url, key)))
        }
    }
}

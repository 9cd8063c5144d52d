//! Graph store construction from configuration.

use crate::error::MemoryResult;
use std::sync::Arc;
use strand_config::{GraphStoreConfig, StoreProvider};
use strand_core::{GraphStore, InMemoryGraphStore};
use tracing::debug;

/// Build the configured graph store backend.
///
/// The store is returned uninitialized; network backends connect lazily on
/// first use or on `initialize()`.
pub fn create_graph_store(config: &GraphStoreConfig) -> MemoryResult<Arc<dyn GraphStore>> {
    config.validate()?;
    debug!(provider = %config.provider, "Creating graph store");

    match config.provider {
        StoreProvider::Memory => Ok(Arc::new(InMemoryGraphStore::new())),
        #[cfg(feature = "falkordb")]
        StoreProvider::FalkorDb => Ok(Arc::new(strand_falkordb::FalkorGraphStore::new(
            config.clone(),
        ))),
        #[cfg(not(feature = "falkordb"))]
        StoreProvider::FalkorDb => Err(crate::error::MemoryError::DependencyUnavailable(
            "FalkorDB support is not compiled in (enable the `falkordb` feature)".to_string(),
        )),
    }
}

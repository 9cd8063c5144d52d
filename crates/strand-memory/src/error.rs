//! Errors surfaced by the memory API.

use strand_config::ConfigError;
use strand_core::{ProviderError, StoreError, TenantError};
use thiserror::Error;

/// Everything a memory call can fail with.
///
/// A missing record is not an error: lookups return `None` and deletes
/// report `success: false`.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Invalid configuration or an unknown backend
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A required backend client is absent or was closed
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// No user, agent, or session identifier was supplied
    #[error(transparent)]
    TenantResolution(#[from] TenantError),

    /// The graph store failed
    #[error("Graph store error: {0}")]
    Store(#[source] StoreError),

    /// The language model or embedder failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<StoreError> for MemoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DependencyUnavailable(message) => Self::DependencyUnavailable(message),
            other => Self::Store(other),
        }
    }
}

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_class() {
        let err = MemoryError::from(StoreError::DependencyUnavailable("closed".into()));
        assert!(matches!(err, MemoryError::DependencyUnavailable(m) if m == "closed"));

        let err = MemoryError::from(StoreError::Unavailable("reset".into()));
        assert!(matches!(err, MemoryError::Store(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_tenant_error_message() {
        let err = MemoryError::from(TenantError::NoIdentifier);
        assert_eq!(
            err.to_string(),
            "At least one of user_id, agent_id, or session_id must be provided"
        );
    }
}

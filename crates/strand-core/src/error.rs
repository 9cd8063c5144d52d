//! Error types shared by every Strand backend and provider.

use thiserror::Error;

/// Tenant resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// None of user, agent, or session was supplied
    #[error("At least one of user_id, agent_id, or session_id must be provided")]
    NoIdentifier,
}

/// Graph store error type
#[derive(Error, Debug)]
pub enum StoreError {
    /// Network or server failure while talking to the database
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    /// The backend client is missing or was closed
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The database answered with a reply this client cannot decode
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The request itself is not valid
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Whether a caller could reasonably retry the same call.
    ///
    /// Only classifies; nothing in this workspace retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for graph store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures from the language-model and embedding capabilities.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Text generation failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Embedding failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The provider answered with something unusable
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

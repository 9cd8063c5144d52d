//! Error types for the FalkorDB backend

use std::time::Duration;
use strand_core::StoreError;
use thiserror::Error;

/// FalkorDB backend error type
#[derive(Error, Debug)]
pub enum FalkorError {
    /// Could not reach the server, or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection establishment exceeded the configured timeout
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the command
    #[error("Query error: {0}")]
    Query(String),

    /// Reply shape or type tag this client does not understand
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The store was closed
    #[error("FalkorDB client is closed")]
    Closed,
}

/// Result type for FalkorDB operations
pub type FalkorResult<T> = Result<T, FalkorError>;

impl From<redis::RedisError> for FalkorError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            Self::Connection(err.to_string())
        } else {
            Self::Query(err.to_string())
        }
    }
}

impl From<FalkorError> for StoreError {
    fn from(err: FalkorError) -> Self {
        match err {
            FalkorError::Connection(msg) => Self::Unavailable(msg),
            FalkorError::Timeout(after) => {
                Self::Unavailable(format!("connection timed out after {after:?}"))
            }
            FalkorError::Query(msg) => Self::InvalidOperation(format!("query rejected: {msg}")),
            FalkorError::Protocol(msg) => Self::Protocol(msg),
            FalkorError::Closed => {
                Self::DependencyUnavailable("FalkorDB client is closed".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            StoreError::from(FalkorError::Connection("refused".into())),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(FalkorError::Timeout(Duration::from_secs(1))),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(FalkorError::Protocol("tag 99".into())),
            StoreError::Protocol(_)
        ));
        assert!(matches!(
            StoreError::from(FalkorError::Closed),
            StoreError::DependencyUnavailable(_)
        ));
    }
}

//! File loading for configuration documents.

use crate::error::{ConfigError, ConfigResult};
use crate::graph::GraphConfig;
use std::path::Path;
use tracing::{debug, info};

/// Loads `GraphConfig` from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse, and validate a TOML configuration file.
    pub async fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<GraphConfig> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading graph configuration");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let config = GraphConfig::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            provider = %config.graph_store.provider,
            "Loaded graph configuration"
        );
        Ok(config)
    }

    /// Like `load_from_file`, but a missing file yields the defaults.
    pub async fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<GraphConfig> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from_file(path).await
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(GraphConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreProvider;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.toml");
        std::fs::write(
            &path,
            "entity_dedup_threshold = 0.85\n[graph_store]\nprovider = \"memory\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).await.unwrap();
        assert_eq!(config.entity_dedup_threshold, 0.85);
        assert_eq!(config.graph_store.provider, StoreProvider::Memory);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigLoader::load_from_file(dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_or_default(dir.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config, GraphConfig::default());
    }
}

//! Top-level graph memory configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::store::{GraphStoreConfig, StoreProvider};
use serde::{Deserialize, Serialize};

/// Configuration for graph memory: store connection, extraction limits,
/// deduplication, and search/traversal bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Graph database connection
    pub graph_store: GraphStoreConfig,
    /// Maximum entities extracted from one message (1..=50)
    pub max_entities_per_message: usize,
    /// Maximum relationships extracted from one message (1..=50)
    pub max_relationships_per_message: usize,
    /// Cosine similarity at which a new entity folds into an existing one (0.0..=1.0)
    pub entity_dedup_threshold: f32,
    /// Result count used when a caller does not pass a limit (1..=100)
    pub default_search_limit: usize,
    /// Ceiling applied to traversal depth requests (1..=10)
    pub max_traversal_hops: usize,
    /// Keep raw episode text; when false, episodes store empty content
    pub store_episode_content: bool,
    /// How many existing entities/relationships are pre-loaded for dedup
    pub existing_graph_limit: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_store: GraphStoreConfig::default(),
            max_entities_per_message: 10,
            max_relationships_per_message: 15,
            entity_dedup_threshold: 0.9,
            default_search_limit: 10,
            max_traversal_hops: 3,
            store_episode_content: true,
            existing_graph_limit: 500,
        }
    }
}

impl GraphConfig {
    /// Configuration backed by the in-memory store, otherwise default.
    pub fn in_memory() -> Self {
        Self {
            graph_store: GraphStoreConfig::memory(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    ///
    /// An unrecognized `graph_store.provider` fails with
    /// [`ConfigError::UnknownProvider`] rather than a generic parse error.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let document: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        if let Some(provider) = document
            .get("graph_store")
            .and_then(|store| store.get("provider"))
            .and_then(toml::Value::as_str)
        {
            provider.parse::<StoreProvider>()?;
        }

        let config: Self = toml::Value::Table(document)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML document.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every bounded field.
    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "max_entities_per_message",
            self.max_entities_per_message,
            1,
            50,
        )?;
        check_range(
            "max_relationships_per_message",
            self.max_relationships_per_message,
            1,
            50,
        )?;
        check_range("default_search_limit", self.default_search_limit, 1, 100)?;
        check_range("max_traversal_hops", self.max_traversal_hops, 1, 10)?;

        if !(0.0..=1.0).contains(&self.entity_dedup_threshold) {
            return Err(ConfigError::validation(
                "entity_dedup_threshold",
                format!("{} is outside 0.0..=1.0", self.entity_dedup_threshold),
            ));
        }
        if self.existing_graph_limit == 0 {
            return Err(ConfigError::validation(
                "existing_graph_limit",
                "must be at least 1",
            ));
        }

        self.graph_store.validate()
    }
}

fn check_range(field: &str, value: usize, min: usize, max: usize) -> ConfigResult<()> {
    if value < min || value > max {
        return Err(ConfigError::validation(
            field,
            format!("{value} is outside {min}..={max}"),
        ));
    }
    Ok(())
}

//! Graph store backend configuration.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Graph store backend selection.
#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// FalkorDB (RedisGraph protocol) reached over RESP
    #[default]
    FalkorDb,
    /// Process-local store, nothing survives the process
    Memory,
}

impl StoreProvider {
    /// All providers this build knows about.
    pub const ALL: [StoreProvider; 2] = [StoreProvider::FalkorDb, StoreProvider::Memory];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FalkorDb => "falkordb",
            Self::Memory => "memory",
        }
    }

    fn available() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "falkordb" | "falkor" | "redisgraph" => Ok(Self::FalkorDb),
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownProvider {
                kind: "graph store".to_string(),
                name: other.to_string(),
                available: Self::available(),
            }),
        }
    }
}

// Goes through FromStr so aliases are accepted.
impl<'de> Deserialize<'de> for StoreProvider {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Connection settings for the graph store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphStoreConfig {
    /// Which backend to use
    pub provider: StoreProvider,
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Username (ACL user); empty means none
    pub user: String,
    /// Password; empty means none
    pub password: String,
    /// Graph key inside the database
    pub graph_name: String,
    /// Use TLS for the connection
    pub use_tls: bool,
    /// Connection establishment timeout in seconds
    pub connection_timeout_secs: f64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::FalkorDb,
            host: "localhost".to_string(),
            port: 6379,
            user: String::new(),
            password: String::new(),
            graph_name: "agentic_memory".to_string(),
            use_tls: false,
            connection_timeout_secs: 30.0,
        }
    }
}

impl GraphStoreConfig {
    /// In-memory store configuration.
    pub fn memory() -> Self {
        Self {
            provider: StoreProvider::Memory,
            ..Self::default()
        }
    }

    /// FalkorDB configuration for the given host and port.
    pub fn falkordb(host: impl Into<String>, port: u16) -> Self {
        Self {
            provider: StoreProvider::FalkorDb,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Username, if one is configured.
    pub fn user(&self) -> Option<&str> {
        Some(self.user.as_str()).filter(|u| !u.is_empty())
    }

    /// Password, if one is configured.
    pub fn password(&self) -> Option<&str> {
        Some(self.password.as_str()).filter(|p| !p.is_empty())
    }

    /// Connection timeout as a `Duration`.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connection_timeout_secs.max(0.0))
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.provider == StoreProvider::FalkorDb {
            if self.host.trim().is_empty() {
                return Err(ConfigError::validation(
                    "graph_store.host",
                    "must not be empty",
                ));
            }
            if self.graph_name.trim().is_empty() {
                return Err(ConfigError::validation(
                    "graph_store.graph_name",
                    "must not be empty",
                ));
            }
        }
        if !self.connection_timeout_secs.is_finite() || self.connection_timeout_secs <= 0.0 {
            return Err(ConfigError::validation(
                "graph_store.connection_timeout_secs",
                "must be a positive number of seconds",
            ));
        }
        Ok(())
    }
}

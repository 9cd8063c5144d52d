//! # Strand Configuration
//!
//! Typed configuration for the graph memory engine: which graph store backend
//! to use and how to reach it, plus the knobs of the extraction pipeline and
//! search layer.
//!
//! Every field has a default matching production behaviour, so an empty TOML
//! document is a valid configuration:
//!
//! ```rust
//! use strand_config::GraphConfig;
//!
//! let config = GraphConfig::from_toml_str("").unwrap();
//! assert_eq!(config.max_traversal_hops, 3);
//! assert_eq!(config.entity_dedup_threshold, 0.9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod graph;
mod loader;
mod store;

pub use error::{ConfigError, ConfigResult};
pub use graph::GraphConfig;
pub use loader::ConfigLoader;
pub use store::{GraphStoreConfig, StoreProvider};

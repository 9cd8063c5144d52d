//! FalkorDB graph store backend for Strand
//!
//! Implements `strand_core::GraphStore` over FalkorDB, reached through the
//! Redis protocol. Every call sends one `GRAPH.QUERY` (writes) or
//! `GRAPH.RO_QUERY` (reads) command with `--compact` and decodes the typed
//! compact reply.
//!
//! ## Layers
//!
//! - **query**: Cypher text construction with inlined, escaped literals
//! - **protocol**: compact reply decoding (`Reply` → `GraphValue` → `ResultSet`)
//! - **transport**: `GraphTransport` trait and the redis-backed implementation
//! - **store**: `FalkorGraphStore`, the `GraphStore` implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use strand_config::GraphStoreConfig;
//! use strand_core::GraphStore;
//! use strand_falkordb::FalkorGraphStore;
//!
//! let store = FalkorGraphStore::new(GraphStoreConfig::falkordb("localhost", 6379));
//! store.initialize().await?;
//! let entities = store.get_entities_by_tenant("user:alice", 20).await?;
//! store.close().await?;
//! ```

pub mod error;
pub mod protocol;
pub mod query;
mod records;
pub mod store;
pub mod transport;

// Re-exports
pub use error::{FalkorError, FalkorResult};
pub use protocol::{GraphValue, QueryStats, Reply, ResultSet, ValueType, COMPACT_TYPE_TABLE_VERSION};
pub use query::GraphCommand;
pub use store::FalkorGraphStore;
pub use transport::{GraphTransport, RedisTransport};

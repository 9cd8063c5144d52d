//! # Strand Core
//!
//! Shared building blocks for the graph memory engine:
//!
//! - [`tenant`]: resolving `{user, agent, session}` selectors into one scoping key
//! - [`model`]: `Entity`, `Relationship`, `Episode` and the hash/id helpers
//! - [`store`]: the `GraphStore` contract every backend implements
//! - [`memory_store`]: a process-local `GraphStore`
//! - [`provider`]: the language-model and embedding capability contracts
//! - [`similarity`]: cosine similarity and top-K ranking
//!
//! Concrete model clients and network backends live in other crates; this
//! crate has no I/O of its own.

#![warn(clippy::all)]

pub mod error;
pub mod memory_store;
pub mod model;
pub mod provider;
pub mod similarity;
pub mod store;
pub mod tenant;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use error::{ProviderError, ProviderResult, StoreError, StoreResult, TenantError};
pub use memory_store::InMemoryGraphStore;
pub use model::{
    fact_hash, generate_id, name_hash, normalize_name, Entity, EntityType, Episode, Metadata,
    Relationship,
};
pub use provider::{Embedder, TextGenerator};
pub use similarity::{cosine_similarity, rank_by_similarity, validate_embedding, Scored};
pub use store::{GraphStore, SIMILARITY_CANDIDATE_LIMIT};
pub use tenant::{TenantId, TenantInfo, TenantSelector, TenantType};

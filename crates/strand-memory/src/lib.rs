//! # Strand Memory
//!
//! Long-term graph memory for conversational agents. Conversation text goes
//! in; entities, relationships, and an episode record come out, deduplicated
//! against what the tenant already knows and isolated per user, agent, or
//! session.
//!
//! ## Architecture
//!
//! - [`extraction`]: the two-call language-model pipeline and entity resolution
//! - [`GraphMemory`]: add/search/traverse/delete over one `GraphStore`
//! - [`MultiTenantGraphMemory`]: resolves `{user, agent, session}` selectors
//! - [`create_graph_store`]: builds the configured backend
//!
//! Language-model and embedding clients are injected as
//! `Arc<dyn TextGenerator>` and `Arc<dyn Embedder>`.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use strand_config::GraphConfig;
//! use strand_core::test_support::{HashingEmbedder, MockTextGenerator};
//! use strand_core::TenantSelector;
//! use strand_memory::{AddOptions, GraphMemory, MultiTenantGraphMemory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let llm = Arc::new(MockTextGenerator::new());
//!     llm.respond_when(
//!         "entity extraction",
//!         r#"{"entities": [{"name": "Alice", "type": "person", "summary": "An engineer"}]}"#,
//!     );
//!
//!     let memory = GraphMemory::from_config(
//!         GraphConfig::in_memory(),
//!         llm,
//!         Arc::new(HashingEmbedder::default()),
//!     )
//!     .await?;
//!     let memory = MultiTenantGraphMemory::new(memory);
//!
//!     let alice = TenantSelector::user("alice");
//!     let added = memory.add("I'm Alice", &alice, AddOptions::default()).await?;
//!     assert_eq!(added.tenant.tenant_id, "user:alice");
//!     assert_eq!(added.result.entities.len(), 1);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod extraction;
mod factory;
mod orchestrator;
mod tenant;

pub use error::{MemoryError, MemoryResult};
pub use factory::create_graph_store;
pub use orchestrator::{
    AddOptions, AddResult, DeleteAllResult, DeleteResult, EntityListing,
    EntityWithRelationships, EpisodeListing, GraphMemory, GraphSearchResult, MemoryInput,
    RelatedEntities, RelationshipListing, SearchResponse, Turn, DEFAULT_LIST_LIMIT,
    DEFAULT_RELATED_HOPS, ENTITY_RELATION_TYPE,
};
pub use tenant::{MultiTenantGraphMemory, TenantScoped};

//! Common fixtures for graph memory tests.

#![allow(dead_code)]

use std::sync::Arc;
use strand_config::GraphConfig;
use strand_core::test_support::{HashingEmbedder, MockTextGenerator};
use strand_core::{Embedder, InMemoryGraphStore};
use strand_memory::{GraphMemory, MultiTenantGraphMemory};

/// Memory wired to an in-memory store, a scripted model, and the hashing
/// embedder. The returned store shares state with the one inside memory.
pub struct Harness {
    pub memory: GraphMemory,
    pub store: InMemoryGraphStore,
    pub llm: Arc<MockTextGenerator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::in_memory())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self::with_parts(config, Arc::new(HashingEmbedder::default()))
    }

    pub fn with_parts(config: GraphConfig, embedder: Arc<dyn Embedder>) -> Self {
        let store = InMemoryGraphStore::new();
        let llm = Arc::new(MockTextGenerator::new());
        let memory = GraphMemory::new(config, Arc::new(store.clone()), llm.clone(), embedder)
            .expect("valid config");
        Self { memory, store, llm }
    }

    pub fn multi_tenant(
        self,
    ) -> (
        MultiTenantGraphMemory,
        InMemoryGraphStore,
        Arc<MockTextGenerator>,
    ) {
        (MultiTenantGraphMemory::new(self.memory), self.store, self.llm)
    }

    /// Queue one `add`: the entity answer, then the relationship answer.
    pub fn script_add(&self, entities: &str, relationships: &str) {
        script_add(&self.llm, entities, relationships);
    }
}

pub fn script_add(llm: &MockTextGenerator, entities: &str, relationships: &str) {
    llm.push_response(entities);
    llm.push_response(relationships);
}

pub const ALICE_AT_ACME: &str = r#"{"entities": [
    {"name": "Alice", "type": "person", "summary": "An engineer"},
    {"name": "Acme", "type": "company", "summary": "A rocket company"}
]}"#;

pub const WORKS_AT: &str = r#"{"relationships": [
    {"source": "Alice", "target": "Acme", "relation_type": "works_at", "fact": "Alice works at Acme"}
]}"#;

pub const ALICE_AND_BOB: &str = r#"{"entities": [
    {"name": "Alice", "type": "person", "summary": "An engineer"},
    {"name": "Bob", "type": "person", "summary": "Alice's friend"}
]}"#;

pub const FRIENDS_WITH: &str = r#"{"relationships": [
    {"source": "Alice", "target": "Bob", "relation_type": "friends_with", "fact": "Alice is friends with Bob"}
]}"#;

pub const NO_RELATIONSHIPS: &str = r#"{"relationships": []}"#;

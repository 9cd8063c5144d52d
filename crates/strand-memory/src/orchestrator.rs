//! The graph memory API over one store, one language model, and one embedder.
//!
//! Every call takes an already-resolved tenant key; see
//! [`MultiTenantGraphMemory`](crate::MultiTenantGraphMemory) for the
//! selector-based front.

use crate::error::MemoryResult;
use crate::extraction::{ExtractionRequest, ExtractionSettings, GraphExtractor};
use crate::factory::create_graph_store;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use strand_config::GraphConfig;
use strand_core::{Embedder, Entity, Episode, GraphStore, Metadata, Relationship, TextGenerator};
use tracing::{debug, info};

/// Listing limit when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Traversal depth when the caller gives none (still clamped by config).
pub const DEFAULT_RELATED_HOPS: usize = 2;

/// `relation_type` of search hits synthesized from entities.
pub const ENTITY_RELATION_TYPE: &str = "entity";

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// `"Role: content"` with the role capitalized.
    fn transcript_line(&self) -> String {
        let role = if self.role.trim().is_empty() {
            default_role()
        } else {
            self.role.trim().to_lowercase()
        };
        let mut chars = role.chars();
        let label: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        format!("{label}: {}", self.content)
    }
}

/// What `add` accepts: plain text or a list of turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryInput {
    Text(String),
    Turns(Vec<Turn>),
}

impl MemoryInput {
    /// The text handed to extraction. Turns become one line each.
    pub fn into_content(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Turns(turns) => turns
                .iter()
                .map(Turn::transcript_line)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for MemoryInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MemoryInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Turn>> for MemoryInput {
    fn from(turns: Vec<Turn>) -> Self {
        Self::Turns(turns)
    }
}

/// Per-call options for `add`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOptions {
    /// Stored on the episode
    pub metadata: Metadata,
    /// Episode source tag; `message` when unset
    pub source: Option<String>,
}

impl AddOptions {
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddResult {
    pub episode_id: String,
    /// New or updated entities
    pub entities: Vec<Entity>,
    /// New relationships
    pub relationships: Vec<Relationship>,
}

/// A fact-shaped search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSearchResult {
    /// Relationship id, or entity id for synthesized hits
    pub id: String,
    pub fact: String,
    /// Relation type, or `entity` for synthesized hits
    pub relation_type: String,
    pub source_entity: String,
    pub target_entity: String,
    pub score: f32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<GraphSearchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityWithRelationships {
    pub entity: Entity,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntities {
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityListing {
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipListing {
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeListing {
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAllResult {
    pub success: bool,
    pub deleted_count: usize,
}

/// Graph memory over an injected store, language model, and embedder.
///
/// The store is initialized on first use. `close()` releases it; later calls
/// fail with `MemoryError::DependencyUnavailable` on backends that hold a
/// connection.
pub struct GraphMemory {
    config: GraphConfig,
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    extractor: GraphExtractor,
    initialized: AtomicBool,
}

impl GraphMemory {
    /// Wire up the components. Validates `config`; does not touch the store.
    pub fn new(
        config: GraphConfig,
        store: Arc<dyn GraphStore>,
        llm: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
    ) -> MemoryResult<Self> {
        config.validate()?;
        let extractor = GraphExtractor::new(
            llm,
            embedder.clone(),
            ExtractionSettings::from_config(&config),
        );
        Ok(Self {
            config,
            store,
            embedder,
            extractor,
            initialized: AtomicBool::new(false),
        })
    }

    /// Build the configured store and initialize it.
    pub async fn from_config(
        config: GraphConfig,
        llm: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
    ) -> MemoryResult<Self> {
        config.validate()?;
        let store = create_graph_store(&config.graph_store)?;
        let memory = Self::new(config, store, llm, embedder)?;
        memory.initialize().await?;
        Ok(memory)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Initialize the store. Repeated calls are no-ops.
    pub async fn initialize(&self) -> MemoryResult<()> {
        if self.initialized.load(AtomicOrdering::Acquire) {
            return Ok(());
        }
        self.store.initialize().await?;
        self.initialized.store(true, AtomicOrdering::Release);
        Ok(())
    }

    /// Extract entities and relationships from `input` and record an episode.
    ///
    /// Exactly one episode is saved per call, even when nothing was extracted.
    pub async fn add(
        &self,
        input: impl Into<MemoryInput>,
        tenant_id: &str,
        options: AddOptions,
    ) -> MemoryResult<AddResult> {
        self.initialize().await?;
        let content = input.into().into_content();

        let extraction = if content.trim().is_empty() {
            debug!(tenant_id, "Empty content, nothing to extract");
            Default::default()
        } else {
            let limit = self.config.existing_graph_limit;
            let existing_entities = self.store.get_entities_by_tenant(tenant_id, limit).await?;
            let existing_relationships = self
                .store
                .get_relationships_by_tenant(tenant_id, limit)
                .await?;

            self.extractor
                .extract(
                    self.store.as_ref(),
                    ExtractionRequest {
                        content: &content,
                        tenant_id,
                        existing_entities: &existing_entities,
                        existing_relationships: &existing_relationships,
                    },
                )
                .await?
        };

        if !extraction.entities.is_empty() {
            self.store.save_entities(&extraction.entities).await?;
        }
        if !extraction.relationships.is_empty() {
            self.store
                .save_relationships(&extraction.relationships)
                .await?;
        }

        let stored_content = if self.config.store_episode_content {
            content
        } else {
            String::new()
        };
        let source = options
            .source
            .unwrap_or_else(|| Episode::DEFAULT_SOURCE.to_string());
        let mut episode = Episode::new(tenant_id, stored_content, source);
        episode.entity_ids = extraction.entities.iter().map(|e| e.id.clone()).collect();
        episode.relationship_ids = extraction
            .relationships
            .iter()
            .map(|r| r.id.clone())
            .collect();
        episode.metadata = options.metadata;
        self.store.save_episode(&episode).await?;

        info!(
            tenant_id,
            episode_id = %episode.id,
            entities = extraction.entities.len(),
            relationships = extraction.relationships.len(),
            "Added graph memory"
        );

        Ok(AddResult {
            episode_id: episode.id,
            entities: extraction.entities,
            relationships: extraction.relationships,
        })
    }

    /// Facts relevant to `query`, best first.
    ///
    /// Relationships are ranked first; only when none match are entities
    /// ranked and turned into pseudo-facts.
    pub async fn search(
        &self,
        query: &str,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> MemoryResult<SearchResponse> {
        self.initialize().await?;
        let limit = limit.unwrap_or(self.config.default_search_limit);
        if limit == 0 {
            return Ok(SearchResponse {
                results: Vec::new(),
            });
        }

        let query_embedding = self.embedder.embed(query).await?;
        let mut results = Vec::new();

        let hits = self
            .store
            .search_relationships(tenant_id, &query_embedding, limit.saturating_mul(2))
            .await?;
        let mut names: HashMap<String, String> = HashMap::new();
        for hit in hits {
            let rel = hit.item;
            let source_entity = self.entity_name(&mut names, &rel.source_id).await?;
            let target_entity = self.entity_name(&mut names, &rel.target_id).await?;
            results.push(GraphSearchResult {
                id: rel.id,
                fact: rel.fact,
                relation_type: rel.relation_type,
                source_entity,
                target_entity,
                score: hit.score,
                metadata: rel.metadata,
            });
        }

        if results.is_empty() {
            let hits = self
                .store
                .search_entities(tenant_id, &query_embedding, limit)
                .await?;
            for hit in hits {
                let entity = hit.item;
                results.push(GraphSearchResult {
                    fact: entity_fact(&entity),
                    id: entity.id,
                    relation_type: ENTITY_RELATION_TYPE.to_string(),
                    source_entity: entity.name,
                    target_entity: String::new(),
                    score: hit.score,
                    metadata: entity.metadata,
                });
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(limit);
        debug!(tenant_id, hits = results.len(), "Graph search complete");
        Ok(SearchResponse { results })
    }

    async fn entity_name(
        &self,
        cache: &mut HashMap<String, String>,
        entity_id: &str,
    ) -> MemoryResult<String> {
        if let Some(name) = cache.get(entity_id) {
            return Ok(name.clone());
        }
        let name = self
            .store
            .get_entity(entity_id)
            .await?
            .map(|e| e.name)
            .unwrap_or_default();
        cache.insert(entity_id.to_string(), name.clone());
        Ok(name)
    }

    /// An entity and every relationship touching it.
    pub async fn get_entity(
        &self,
        entity_id: &str,
    ) -> MemoryResult<Option<EntityWithRelationships>> {
        self.initialize().await?;
        let Some(entity) = self.store.get_entity(entity_id).await? else {
            return Ok(None);
        };
        let relationships = self.store.get_entity_relationships(entity_id).await?;
        Ok(Some(EntityWithRelationships {
            entity,
            relationships,
        }))
    }

    /// Entities within `hops` of `entity_id`, clamped to
    /// `max_traversal_hops`. The start entity is not included.
    pub async fn get_related(
        &self,
        entity_id: &str,
        hops: Option<usize>,
        tenant_id: Option<&str>,
    ) -> MemoryResult<RelatedEntities> {
        self.initialize().await?;
        let requested = hops.unwrap_or(DEFAULT_RELATED_HOPS);
        let hops = requested.min(self.config.max_traversal_hops);
        if hops < requested {
            debug!(requested, hops, "Clamped traversal depth");
        }
        let entities = self.store.traverse(entity_id, hops, tenant_id).await?;
        Ok(RelatedEntities { entities })
    }

    pub async fn get_all_entities(
        &self,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> MemoryResult<EntityListing> {
        self.initialize().await?;
        let entities = self
            .store
            .get_entities_by_tenant(tenant_id, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?;
        Ok(EntityListing { entities })
    }

    pub async fn get_all_relationships(
        &self,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> MemoryResult<RelationshipListing> {
        self.initialize().await?;
        let relationships = self
            .store
            .get_relationships_by_tenant(tenant_id, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?;
        Ok(RelationshipListing { relationships })
    }

    /// Episodes, newest first.
    pub async fn get_episodes(
        &self,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> MemoryResult<EpisodeListing> {
        self.initialize().await?;
        let episodes = self
            .store
            .get_episodes_by_tenant(tenant_id, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await?;
        Ok(EpisodeListing { episodes })
    }

    /// Delete one entity and its relationships.
    pub async fn delete(&self, entity_id: &str) -> MemoryResult<DeleteResult> {
        self.initialize().await?;
        if self.store.get_entity(entity_id).await?.is_none() {
            return Ok(DeleteResult {
                success: false,
                message: "Entity not found".to_string(),
            });
        }
        self.store.delete_entity(entity_id).await?;
        Ok(DeleteResult {
            success: true,
            message: "Entity deleted".to_string(),
        })
    }

    /// Delete everything stored under `tenant_id`.
    pub async fn delete_all(&self, tenant_id: &str) -> MemoryResult<DeleteAllResult> {
        self.initialize().await?;
        let deleted_count = self.store.delete_all_for_tenant(tenant_id).await?;
        Ok(DeleteAllResult {
            success: true,
            deleted_count,
        })
    }

    /// Release the store.
    pub async fn close(&self) -> MemoryResult<()> {
        self.initialized.store(false, AtomicOrdering::Release);
        self.store.close().await?;
        info!("Graph memory closed");
        Ok(())
    }
}

/// `"name: summary"`, or `"name is a type"` without a summary.
fn entity_fact(entity: &Entity) -> String {
    if entity.summary.is_empty() {
        format!("{} is a {}", entity.name, entity.entity_type)
    } else {
        format!("{}: {}", entity.name, entity.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::EntityType;
    use test_case::test_case;

    #[test]
    fn test_turns_become_transcript() {
        let input = MemoryInput::from(vec![
            Turn::user("I work at Acme"),
            Turn::assistant("Nice!"),
            Turn::new("SYSTEM", "be brief"),
        ]);
        assert_eq!(
            input.into_content(),
            "User: I work at Acme\nAssistant: Nice!\nSystem: be brief"
        );
    }

    #[test]
    fn test_turn_role_defaults_to_user() {
        let turns: Vec<Turn> =
            serde_json::from_str(r#"[{"content": "hi"}, {"role": "", "content": "again"}]"#)
                .unwrap();
        assert_eq!(MemoryInput::from(turns).into_content(), "User: hi\nUser: again");
    }

    #[test]
    fn test_text_input_is_unchanged() {
        assert_eq!(MemoryInput::from("  raw text ").into_content(), "  raw text ");
    }

    #[test_case("Acme", EntityType::Company, "", "Acme is a company")]
    #[test_case("Acme", EntityType::Company, "A rocket maker", "Acme: A rocket maker")]
    fn test_entity_fact(name: &str, entity_type: EntityType, summary: &str, expected: &str) {
        let entity = Entity::new("t", name, entity_type, summary);
        assert_eq!(entity_fact(&entity), expected);
    }

    #[test]
    fn test_add_options_builder() {
        let mut metadata = Metadata::new();
        metadata.insert("channel".into(), "slack".into());
        let options = AddOptions::default()
            .with_metadata(metadata.clone())
            .with_source("import");
        assert_eq!(options.metadata, metadata);
        assert_eq!(options.source.as_deref(), Some("import"));
    }
}

//! Two-call extraction with entity deduplication.
//!
//! 1. Ask the model for entities and resolve each one against the tenant's
//!    graph: exact name-hash match first, then embedding similarity, else new.
//! 2. Ask the model for relationships among the resolved entities, keep the
//!    ones whose endpoints resolve, and embed their facts.
//!
//! Malformed model output degrades that step to an empty result. Provider
//! and store failures propagate.

use super::parse::{parse_entities, parse_relationships, RawEntity, RawRelationship};
use super::prompts::{
    conversation_prompt, entity_system_prompt, relationship_system_prompt, MAX_KNOWN_FACTS,
};
use crate::error::MemoryResult;
use std::collections::HashMap;
use std::sync::Arc;
use strand_config::GraphConfig;
use strand_core::{
    cosine_similarity, name_hash, normalize_name, Embedder, Entity, EntityType, GraphStore,
    Relationship, TextGenerator,
};
use tracing::{debug, warn};

/// Limits for one extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSettings {
    pub max_entities: usize,
    pub max_relationships: usize,
    /// Minimum cosine similarity for two entities to be the same
    pub dedup_threshold: f32,
}

impl ExtractionSettings {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            max_entities: config.max_entities_per_message,
            max_relationships: config.max_relationships_per_message,
            dedup_threshold: config.entity_dedup_threshold,
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self::from_config(&GraphConfig::default())
    }
}

/// Input of one extraction pass.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub content: &'a str,
    pub tenant_id: &'a str,
    /// Pre-loaded tenant entities, consulted before the store
    pub existing_entities: &'a [Entity],
    /// Pre-loaded tenant relationships, shown to the model as known facts
    pub existing_relationships: &'a [Relationship],
}

/// Output of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// New or changed entities; these need saving
    pub entities: Vec<Entity>,
    /// New relationships; these need saving
    pub relationships: Vec<Relationship>,
    /// Every entity the text mentioned, after resolution
    pub resolved: Vec<Entity>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.relationships.is_empty()
    }
}

struct Slot {
    entity: Entity,
    is_new: bool,
    changed: bool,
}

/// Resolution state for one pass: resolved entities plus a lookup from
/// normalized mention to slot.
#[derive(Default)]
struct Resolution {
    slots: Vec<Slot>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl Resolution {
    /// Slot for an entity that already exists, creating it on first sight.
    fn existing_slot(&mut self, entity: Entity) -> usize {
        if let Some(&idx) = self.by_id.get(&entity.id) {
            return idx;
        }
        self.push(entity, false)
    }

    fn push(&mut self, entity: Entity, is_new: bool) -> usize {
        let idx = self.slots.len();
        self.by_id.insert(entity.id.clone(), idx);
        self.by_name.insert(normalize_name(&entity.name), idx);
        self.slots.push(Slot {
            entity,
            is_new,
            changed: false,
        });
        idx
    }

    fn merge(&mut self, idx: usize, mention: &str, raw: &RawEntity) {
        self.by_name.insert(normalize_name(mention), idx);
        let slot = &mut self.slots[idx];
        if merge_entity(&mut slot.entity, raw) {
            slot.changed = true;
        }
    }

    fn id_for(&self, mention: &str) -> Option<&str> {
        self.by_name
            .get(&normalize_name(mention))
            .map(|&idx| self.slots[idx].entity.id.as_str())
    }

    /// Highest-scoring entity with an embedding, among pre-loaded and
    /// already-resolved entities.
    fn best_match(&self, existing: &[Entity], embedding: &[f32]) -> Option<(Entity, f32)> {
        existing
            .iter()
            .chain(self.slots.iter().map(|s| &s.entity))
            .filter_map(|e| {
                let other = e.embedding.as_deref()?;
                Some((e, cosine_similarity(embedding, other)))
            })
            .fold(None::<(&Entity, f32)>, |best, (e, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((e, score)),
            })
            .map(|(e, score)| (e.clone(), score))
    }
}

/// Fold a new mention into an existing entity. Prior non-empty data is never
/// discarded: the summary only grows and a type only moves off `Other`.
fn merge_entity(entity: &mut Entity, raw: &RawEntity) -> bool {
    let mut changed = false;
    if entity.entity_type == EntityType::Other && raw.entity_type != EntityType::Other {
        entity.entity_type = raw.entity_type;
        changed = true;
    }
    let summary = raw.summary.trim();
    if !summary.is_empty() && !entity.summary.contains(summary) {
        entity.summary = if entity.summary.is_empty() {
            summary.to_string()
        } else {
            format!("{}; {}", entity.summary, summary)
        };
        changed = true;
    }
    changed
}

/// Runs the extraction pipeline against a language model and an embedder.
pub struct GraphExtractor {
    llm: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    settings: ExtractionSettings,
}

impl GraphExtractor {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            llm,
            embedder,
            settings,
        }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extract and resolve entities, then relationships, from `request.content`.
    ///
    /// Nothing is persisted here; the store is only read for exact-name
    /// lookups.
    pub async fn extract(
        &self,
        store: &dyn GraphStore,
        request: ExtractionRequest<'_>,
    ) -> MemoryResult<Extraction> {
        let raw_entities = self.extract_entities(request.content).await?;
        let resolution = self.resolve_entities(store, &request, raw_entities).await?;

        let relationships = if resolution.slots.is_empty() {
            debug!("No entities resolved, skipping relationship extraction");
            Vec::new()
        } else {
            self.extract_relationships(&request, &resolution).await?
        };

        let mut extraction = Extraction::default();
        for slot in resolution.slots {
            if slot.is_new || slot.changed {
                extraction.entities.push(slot.entity.clone());
            }
            extraction.resolved.push(slot.entity);
        }
        extraction.relationships = relationships;

        debug!(
            tenant_id = request.tenant_id,
            resolved = extraction.resolved.len(),
            entities = extraction.entities.len(),
            relationships = extraction.relationships.len(),
            "Extraction complete"
        );
        Ok(extraction)
    }

    async fn extract_entities(&self, content: &str) -> MemoryResult<Vec<RawEntity>> {
        let response = self
            .llm
            .generate(
                &entity_system_prompt(self.settings.max_entities),
                &conversation_prompt(content),
            )
            .await?;

        match parse_entities(&response) {
            Ok(mut entities) => {
                entities.truncate(self.settings.max_entities);
                debug!(count = entities.len(), "Entities extracted");
                Ok(entities)
            }
            Err(e) => {
                warn!(step = "entities", error = %e, "Malformed model output, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn resolve_entities(
        &self,
        store: &dyn GraphStore,
        request: &ExtractionRequest<'_>,
        raw_entities: Vec<RawEntity>,
    ) -> MemoryResult<Resolution> {
        let mut resolution = Resolution::default();

        for raw in &raw_entities {
            if let Some(&idx) = resolution.by_name.get(&normalize_name(&raw.name)) {
                resolution.merge(idx, &raw.name, raw);
                continue;
            }

            let hash = name_hash(&raw.name);
            let exact = match request
                .existing_entities
                .iter()
                .find(|e| e.name_hash == hash)
            {
                Some(found) => Some(found.clone()),
                None => store.find_entity_by_name_hash(request.tenant_id, &hash).await?,
            };
            if let Some(found) = exact {
                debug!(name = %raw.name, entity_id = %found.id, "Exact name match");
                let idx = resolution.existing_slot(found);
                resolution.merge(idx, &raw.name, raw);
                continue;
            }

            let candidate = Entity::new(
                request.tenant_id,
                raw.name.clone(),
                raw.entity_type,
                raw.summary.clone(),
            );
            let embedding = self.embedder.embed(&candidate.embedding_text()).await?;

            match resolution.best_match(request.existing_entities, &embedding) {
                Some((matched, score)) if score >= self.settings.dedup_threshold => {
                    debug!(
                        name = %raw.name,
                        matched = %matched.name,
                        score,
                        "Similarity match"
                    );
                    let idx = resolution.existing_slot(matched);
                    resolution.merge(idx, &raw.name, raw);
                }
                _ => {
                    resolution.push(candidate.with_embedding(embedding), true);
                }
            }
        }

        // Changed entities get a fresh embedding over their merged text
        let stale: Vec<usize> = resolution
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.changed || (s.is_new && s.entity.embedding.is_none()))
            .map(|(idx, _)| idx)
            .collect();
        if !stale.is_empty() {
            let texts: Vec<String> = stale
                .iter()
                .map(|&idx| resolution.slots[idx].entity.embedding_text())
                .collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for (idx, vector) in stale.into_iter().zip(vectors) {
                let entity = &mut resolution.slots[idx].entity;
                entity.embedding = Some(vector);
                entity.touch();
            }
        }

        Ok(resolution)
    }

    async fn extract_relationships(
        &self,
        request: &ExtractionRequest<'_>,
        resolution: &Resolution,
    ) -> MemoryResult<Vec<Relationship>> {
        let entities: Vec<Entity> = resolution.slots.iter().map(|s| s.entity.clone()).collect();
        let known_facts: Vec<String> = request
            .existing_relationships
            .iter()
            .filter(|r| {
                resolution.by_id.contains_key(&r.source_id)
                    || resolution.by_id.contains_key(&r.target_id)
            })
            .take(MAX_KNOWN_FACTS)
            .map(|r| r.fact.clone())
            .collect();

        let response = self
            .llm
            .generate(
                &relationship_system_prompt(
                    &entities,
                    &known_facts,
                    self.settings.max_relationships,
                ),
                &conversation_prompt(request.content),
            )
            .await?;

        let mut raw_relationships = match parse_relationships(&response) {
            Ok(rels) => rels,
            Err(e) => {
                warn!(step = "relationships", error = %e, "Malformed model output, treating as empty");
                return Ok(Vec::new());
            }
        };
        raw_relationships.truncate(self.settings.max_relationships);

        let mut relationships = Vec::new();
        let mut unknown = Vec::new();
        for raw in raw_relationships {
            let (Some(source_id), Some(target_id)) =
                (resolution.id_for(&raw.source), resolution.id_for(&raw.target))
            else {
                unknown.push(format!("{} -> {}", raw.source, raw.target));
                continue;
            };
            if source_id == target_id {
                debug!(entity = %raw.source, "Skipping self-referencing relationship");
                continue;
            }
            let fact = fact_text(&raw);
            relationships.push(Relationship::new(
                request.tenant_id,
                source_id,
                target_id,
                raw.relation_type,
                fact,
            ));
        }

        if !unknown.is_empty() {
            warn!(
                discarded = unknown.len(),
                pairs = ?unknown,
                "Discarding relationships that reference unknown entities"
            );
        }

        if !relationships.is_empty() {
            let facts: Vec<String> = relationships.iter().map(|r| r.fact.clone()).collect();
            let vectors = self.embedder.embed_batch(&facts).await?;
            for (rel, vector) in relationships.iter_mut().zip(vectors) {
                rel.embedding = Some(vector);
            }
        }

        debug!(count = relationships.len(), "Relationships extracted");
        Ok(relationships)
    }
}

/// The model's fact sentence, or one built from the triple.
fn fact_text(raw: &RawRelationship) -> String {
    if raw.fact.is_empty() {
        format!(
            "{} {} {}",
            raw.source,
            raw.relation_type.replace('_', " "),
            raw.target
        )
    } else {
        raw.fact.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::test_support::{HashingEmbedder, MockTextGenerator};
    use strand_core::InMemoryGraphStore;

    const TENANT: &str = "user:alice";

    fn raw(name: &str, entity_type: EntityType, summary: &str) -> RawEntity {
        RawEntity {
            name: name.to_string(),
            entity_type,
            summary: summary.to_string(),
        }
    }

    fn extractor(llm: Arc<MockTextGenerator>) -> GraphExtractor {
        GraphExtractor::new(
            llm,
            Arc::new(HashingEmbedder::default()),
            ExtractionSettings::default(),
        )
    }

    fn request<'a>(
        content: &'a str,
        existing_entities: &'a [Entity],
        existing_relationships: &'a [Relationship],
    ) -> ExtractionRequest<'a> {
        ExtractionRequest {
            content,
            tenant_id: TENANT,
            existing_entities,
            existing_relationships,
        }
    }

    #[test]
    fn test_merge_keeps_prior_data() {
        let mut entity = Entity::new(TENANT, "Alice", EntityType::Other, "An engineer");

        assert!(merge_entity(&mut entity, &raw("Alice", EntityType::Person, "Works at Acme")));
        assert_eq!(entity.entity_type, EntityType::Person);
        assert_eq!(entity.summary, "An engineer; Works at Acme");

        // Already known: nothing changes
        assert!(!merge_entity(&mut entity, &raw("Alice", EntityType::Company, "Works at Acme")));
        assert_eq!(entity.entity_type, EntityType::Person);

        // Empty summaries never erase
        assert!(!merge_entity(&mut entity, &raw("alice", EntityType::Other, "")));
        assert_eq!(entity.summary, "An engineer; Works at Acme");
    }

    #[test]
    fn test_fact_text_fallback() {
        let rel = RawRelationship {
            source: "Alice".into(),
            target: "Acme".into(),
            relation_type: "works_at".into(),
            fact: String::new(),
        };
        assert_eq!(fact_text(&rel), "Alice works at Acme");
    }

    #[tokio::test]
    async fn test_exact_match_reuses_preloaded_entity() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(
            r#"{"entities": [{"name": "ALICE", "type": "person", "summary": "An engineer"}]}"#,
        );
        llm.push_response(r#"{"relationships": []}"#);
        let existing = vec![Entity::new(TENANT, "Alice", EntityType::Person, "An engineer")];
        let store = InMemoryGraphStore::new();

        let extraction = extractor(llm)
            .extract(&store, request("ALICE here", &existing, &[]))
            .await
            .unwrap();

        assert_eq!(extraction.resolved.len(), 1);
        assert_eq!(extraction.resolved[0].id, existing[0].id);
        // Nothing new to say about Alice
        assert!(extraction.entities.is_empty());
    }

    #[tokio::test]
    async fn test_exact_match_falls_back_to_store() {
        let store = InMemoryGraphStore::new();
        let stored = Entity::new(TENANT, "Acme Corp", EntityType::Company, "");
        store.save_entity(&stored).await.unwrap();

        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(
            r#"{"entities": [{"name": "acme  corp", "type": "company", "summary": "A rocket maker"}]}"#,
        );
        llm.push_response(r#"{"relationships": []}"#);

        let extraction = extractor(llm)
            .extract(&store, request("acme corp", &[], &[]))
            .await
            .unwrap();

        assert_eq!(extraction.entities.len(), 1);
        let updated = &extraction.entities[0];
        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.name, "Acme Corp");
        assert_eq!(updated.summary, "A rocket maker");
        assert!(updated.embedding.is_some());
    }

    #[tokio::test]
    async fn test_similarity_match_uses_threshold() {
        let embedder = HashingEmbedder::default();
        let existing = vec![Entity::new(TENANT, "Acme Rockets", EntityType::Company, "")
            .with_embedding(embedder.vector_for("Acme Rockets: A rocket company"))];

        let llm = Arc::new(MockTextGenerator::new());
        llm.respond_when(
            "entity extraction",
            r#"{"entities": [{"name": "Acme Rockets Inc", "type": "company", "summary": "A rocket company"}]}"#,
        );
        llm.respond_when("relationship extraction", r#"{"relationships": []}"#);
        let store = InMemoryGraphStore::new();

        let loose = GraphExtractor::new(
            llm.clone(),
            Arc::new(HashingEmbedder::default()),
            ExtractionSettings {
                dedup_threshold: 0.5,
                ..ExtractionSettings::default()
            },
        );
        let extraction = loose
            .extract(&store, request("text", &existing, &[]))
            .await
            .unwrap();
        assert_eq!(extraction.resolved[0].id, existing[0].id);

        let strict = GraphExtractor::new(
            llm,
            Arc::new(HashingEmbedder::default()),
            ExtractionSettings {
                dedup_threshold: 1.0,
                ..ExtractionSettings::default()
            },
        );
        let extraction = strict
            .extract(&store, request("text", &existing, &[]))
            .await
            .unwrap();
        assert_ne!(extraction.resolved[0].id, existing[0].id);
        assert_eq!(extraction.resolved[0].name, "Acme Rockets Inc");
    }

    #[tokio::test]
    async fn test_repeated_mentions_collapse() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(
            r#"{"entities": [
                {"name": "Bob", "type": "other"},
                {"name": "bob", "type": "person", "summary": "A friend"}
            ]}"#,
        );
        llm.push_response(r#"{"relationships": []}"#);
        let store = InMemoryGraphStore::new();

        let extraction = extractor(llm)
            .extract(&store, request("Bob and bob", &[], &[]))
            .await
            .unwrap();

        assert_eq!(extraction.entities.len(), 1);
        assert_eq!(extraction.entities[0].entity_type, EntityType::Person);
        assert_eq!(extraction.entities[0].summary, "A friend");
    }

    #[tokio::test]
    async fn test_relationships_resolve_and_discard_unknown() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(
            r#"{"entities": [
                {"name": "Alice", "type": "person"},
                {"name": "Acme", "type": "company"}
            ]}"#,
        );
        llm.push_response(
            r#"{"relationships": [
                {"source": "alice", "target": "Acme", "relation_type": "Works At", "fact": "Alice works at Acme"},
                {"source": "Alice", "target": "Mars", "relation_type": "visited", "fact": "Alice visited Mars"},
                {"source": "Alice", "target": "Alice", "relation_type": "is", "fact": "Alice is Alice"}
            ]}"#,
        );
        let store = InMemoryGraphStore::new();

        let extraction = extractor(llm.clone())
            .extract(&store, request("Alice works at Acme", &[], &[]))
            .await
            .unwrap();

        assert_eq!(extraction.relationships.len(), 1);
        let rel = &extraction.relationships[0];
        assert_eq!(rel.relation_type, "works_at");
        assert_eq!(rel.source_id, extraction.resolved[0].id);
        assert_eq!(rel.target_id, extraction.resolved[1].id);
        assert!(rel.embedding.is_some());

        let calls = llm.call_history();
        assert!(calls[1].system_prompt.contains("- Alice (person)\n- Acme (company)"));
        assert_eq!(calls[1].user_prompt, "Conversation:\nAlice works at Acme");
    }

    #[tokio::test]
    async fn test_no_entities_skips_relationship_call() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(r#"{"entities": []}"#);
        let store = InMemoryGraphStore::new();

        let extraction = extractor(llm.clone())
            .extract(&store, request("hello", &[], &[]))
            .await
            .unwrap();

        assert!(extraction.is_empty());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_caps_apply_to_model_output() {
        let entities: Vec<String> = (0..5)
            .map(|i| format!(r#"{{"name": "Thing {i}", "type": "product"}}"#))
            .collect();
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(format!(r#"{{"entities": [{}]}}"#, entities.join(",")));
        llm.push_response(r#"{"relationships": []}"#);
        let store = InMemoryGraphStore::new();

        let extractor = GraphExtractor::new(
            llm,
            Arc::new(HashingEmbedder::default()),
            ExtractionSettings {
                max_entities: 3,
                ..ExtractionSettings::default()
            },
        );
        let extraction = extractor
            .extract(&store, request("things", &[], &[]))
            .await
            .unwrap();
        assert_eq!(extraction.entities.len(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_error("rate limited");
        let store = InMemoryGraphStore::new();

        let err = extractor(llm)
            .extract(&store, request("hello", &[], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::MemoryError::Provider(_)));
    }
}

//! Process-local `GraphStore`.
//!
//! Same semantics as the network backend: upsert by id, newest-first tenant
//! listings, brute-force similarity over at most `SIMILARITY_CANDIDATE_LIMIT`
//! candidates, undirected bounded traversal, detach-delete tenant wipe.
//! Nothing survives the process.

use crate::error::StoreResult;
use crate::model::{Entity, Episode, Relationship};
use crate::similarity::{rank_by_similarity, validate_embedding, Scored};
use crate::store::{GraphStore, SIMILARITY_CANDIDATE_LIMIT};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct GraphState {
    entities: HashMap<String, Entity>,
    relationships: HashMap<String, Relationship>,
    episodes: HashMap<String, Episode>,
}

/// In-memory graph store.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryGraphStore {
    state: Arc<RwLock<GraphState>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.state.read().entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.read().relationships.len()
    }

    pub fn episode_count(&self) -> usize {
        self.state.read().episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.read();
        state.entities.is_empty() && state.relationships.is_empty() && state.episodes.is_empty()
    }

    /// Drop everything.
    pub fn clear(&self) {
        *self.state.write() = GraphState::default();
    }
}

/// Newest first; ids break ties so listings are deterministic.
fn newest_first<T, F>(mut items: Vec<T>, limit: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> (chrono::DateTime<chrono::Utc>, &str),
{
    items.sort_by(|a, b| {
        let (ta, ia) = key(a);
        let (tb, ib) = key(b);
        tb.cmp(&ta).then_with(|| ia.cmp(ib))
    });
    items.truncate(limit);
    items
}

impl GraphState {
    fn tenant_entities(&self, tenant_id: &str, limit: usize) -> Vec<Entity> {
        let items = self
            .entities
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        newest_first(items, limit, |e| (e.created_at, e.id.as_str()))
    }

    fn tenant_relationships(&self, tenant_id: &str, limit: usize) -> Vec<Relationship> {
        let items = self
            .relationships
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        newest_first(items, limit, |r| (r.created_at, r.id.as_str()))
    }

    fn neighbours(&self, entity_id: &str) -> Vec<&str> {
        self.relationships
            .values()
            .filter_map(|r| {
                if r.source_id == entity_id {
                    Some(r.target_id.as_str())
                } else if r.target_id == entity_id {
                    Some(r.source_id.as_str())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn save_entity(&self, entity: &Entity) -> StoreResult<()> {
        validate_embedding(entity.embedding.as_deref())?;
        self.state
            .write()
            .entities
            .insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    async fn get_entity(&self, entity_id: &str) -> StoreResult<Option<Entity>> {
        Ok(self.state.read().entities.get(entity_id).cloned())
    }

    async fn get_entities_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Entity>> {
        Ok(self.state.read().tenant_entities(tenant_id, limit))
    }

    async fn find_entity_by_name_hash(
        &self,
        tenant_id: &str,
        name_hash: &str,
    ) -> StoreResult<Option<Entity>> {
        Ok(self
            .state
            .read()
            .entities
            .values()
            .find(|e| e.tenant_id == tenant_id && e.name_hash == name_hash)
            .cloned())
    }

    async fn delete_entity(&self, entity_id: &str) -> StoreResult<bool> {
        let mut state = self.state.write();
        if state.entities.remove(entity_id).is_none() {
            return Ok(false);
        }
        state.relationships.retain(|_, r| !r.touches(entity_id));
        Ok(true)
    }

    async fn save_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        validate_embedding(relationship.embedding.as_deref())?;
        let mut state = self.state.write();
        // MATCH on both endpoints: nothing is written when either is missing.
        if !state.entities.contains_key(&relationship.source_id)
            || !state.entities.contains_key(&relationship.target_id)
        {
            debug!(
                relationship_id = %relationship.id,
                "Skipping relationship with missing endpoint"
            );
            return Ok(());
        }
        state
            .relationships
            .insert(relationship.id.clone(), relationship.clone());
        Ok(())
    }

    async fn get_relationship(&self, relationship_id: &str) -> StoreResult<Option<Relationship>> {
        Ok(self.state.read().relationships.get(relationship_id).cloned())
    }

    async fn get_relationships_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Relationship>> {
        Ok(self.state.read().tenant_relationships(tenant_id, limit))
    }

    async fn get_entity_relationships(&self, entity_id: &str) -> StoreResult<Vec<Relationship>> {
        let state = self.state.read();
        let items = state
            .relationships
            .values()
            .filter(|r| r.touches(entity_id))
            .cloned()
            .collect();
        Ok(newest_first(items, usize::MAX, |r| {
            (r.created_at, r.id.as_str())
        }))
    }

    async fn delete_relationship(&self, relationship_id: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .write()
            .relationships
            .remove(relationship_id)
            .is_some())
    }

    async fn save_episode(&self, episode: &Episode) -> StoreResult<()> {
        self.state
            .write()
            .episodes
            .insert(episode.id.clone(), episode.clone());
        Ok(())
    }

    async fn get_episode(&self, episode_id: &str) -> StoreResult<Option<Episode>> {
        Ok(self.state.read().episodes.get(episode_id).cloned())
    }

    async fn get_episodes_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Episode>> {
        let state = self.state.read();
        let items = state
            .episodes
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        Ok(newest_first(items, limit, |e| (e.created_at, e.id.as_str())))
    }

    async fn search_entities(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> StoreResult<Vec<Scored<Entity>>> {
        let candidates = self
            .state
            .read()
            .tenant_entities(tenant_id, SIMILARITY_CANDIDATE_LIMIT);
        Ok(rank_by_similarity(
            candidates,
            query_embedding,
            limit,
            |e| e.embedding.as_deref(),
        ))
    }

    async fn search_relationships(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> StoreResult<Vec<Scored<Relationship>>> {
        let candidates = self
            .state
            .read()
            .tenant_relationships(tenant_id, SIMILARITY_CANDIDATE_LIMIT);
        Ok(rank_by_similarity(
            candidates,
            query_embedding,
            limit,
            |r| r.embedding.as_deref(),
        ))
    }

    async fn traverse(
        &self,
        entity_id: &str,
        max_hops: usize,
        tenant_id: Option<&str>,
    ) -> StoreResult<Vec<Entity>> {
        let state = self.state.read();
        if !state.entities.contains_key(entity_id) || max_hops == 0 {
            return Ok(Vec::new());
        }

        let mut seen: HashSet<&str> = HashSet::from([entity_id]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(entity_id, 0)]);
        let mut found = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_hops {
                continue;
            }
            for next in state.neighbours(current) {
                if !seen.insert(next) {
                    continue;
                }
                queue.push_back((next, depth + 1));
                if let Some(entity) = state.entities.get(next) {
                    if tenant_id.map_or(true, |t| entity.tenant_id == t) {
                        found.push(entity.clone());
                    }
                }
            }
        }

        Ok(found)
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> StoreResult<usize> {
        let mut state = self.state.write();

        let doomed: HashSet<String> = state
            .entities
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| e.id.clone())
            .collect();
        let episode_count = state
            .episodes
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .count();

        state.entities.retain(|id, _| !doomed.contains(id));
        state.episodes.retain(|_, e| e.tenant_id != tenant_id);
        state
            .relationships
            .retain(|_, r| !doomed.contains(&r.source_id) && !doomed.contains(&r.target_id));

        let deleted = doomed.len() + episode_count;
        debug!(tenant_id, deleted, "Deleted tenant nodes");
        Ok(deleted)
    }
}

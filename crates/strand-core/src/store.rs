//! Graph store contract.
//!
//! `GraphStore` is the capability set every backend implements: upserts and
//! lookups for the three record kinds, tenant-scoped listing and similarity
//! search, bounded traversal, and a per-tenant wipe.
//!
//! Single-id lookups (`get_entity`, `get_relationship`, `get_episode`) are
//! global; callers that need tenant scoping check `tenant_id` themselves.
//! Every other read is filtered by tenant.
//!
//! Backends: `InMemoryGraphStore` in this crate, `FalkorGraphStore` in
//! `strand-falkordb`.

use crate::error::StoreResult;
use crate::model::{Entity, Episode, Relationship};
use crate::similarity::Scored;
use async_trait::async_trait;

/// How many tenant records similarity search loads before scoring.
///
/// There is no vector index; ranking is brute force over at most this many
/// candidates (newest first).
pub const SIMILARITY_CANDIDATE_LIMIT: usize = 500;

/// Storage contract for entities, relationships and episodes.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // === Lifecycle ===

    /// Prepare the backend. Idempotent.
    async fn initialize(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Release connections. Calls after `close` fail with `DependencyUnavailable`
    /// on backends that hold a connection.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }

    // === Entities ===

    /// Upsert by id.
    async fn save_entity(&self, entity: &Entity) -> StoreResult<()>;

    /// Upsert several entities, in order.
    async fn save_entities(&self, entities: &[Entity]) -> StoreResult<()> {
        for entity in entities {
            self.save_entity(entity).await?;
        }
        Ok(())
    }

    async fn get_entity(&self, entity_id: &str) -> StoreResult<Option<Entity>>;

    /// Newest first (by `created_at`), at most `limit`.
    async fn get_entities_by_tenant(&self, tenant_id: &str, limit: usize)
        -> StoreResult<Vec<Entity>>;

    /// Exact lookup by normalized-name hash within a tenant.
    async fn find_entity_by_name_hash(
        &self,
        tenant_id: &str,
        name_hash: &str,
    ) -> StoreResult<Option<Entity>>;

    /// Delete the entity and every incident relationship.
    ///
    /// Returns `false` when the entity did not exist.
    async fn delete_entity(&self, entity_id: &str) -> StoreResult<bool>;

    // === Relationships ===

    /// Upsert by id. Both endpoints must already exist.
    async fn save_relationship(&self, relationship: &Relationship) -> StoreResult<()>;

    async fn save_relationships(&self, relationships: &[Relationship]) -> StoreResult<()> {
        for relationship in relationships {
            self.save_relationship(relationship).await?;
        }
        Ok(())
    }

    async fn get_relationship(&self, relationship_id: &str) -> StoreResult<Option<Relationship>>;

    /// Newest first, at most `limit`.
    async fn get_relationships_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Relationship>>;

    /// Relationships where the entity is source or target.
    async fn get_entity_relationships(&self, entity_id: &str) -> StoreResult<Vec<Relationship>>;

    async fn delete_relationship(&self, relationship_id: &str) -> StoreResult<bool>;

    // === Episodes ===

    async fn save_episode(&self, episode: &Episode) -> StoreResult<()>;

    async fn get_episode(&self, episode_id: &str) -> StoreResult<Option<Episode>>;

    /// Newest first, at most `limit`.
    async fn get_episodes_by_tenant(&self, tenant_id: &str, limit: usize)
        -> StoreResult<Vec<Episode>>;

    // === Search ===

    /// Top `limit` tenant entities by cosine similarity to `query_embedding`.
    async fn search_entities(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> StoreResult<Vec<Scored<Entity>>>;

    /// Top `limit` tenant relationships by cosine similarity of their fact embedding.
    async fn search_relationships(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> StoreResult<Vec<Scored<Relationship>>>;

    /// Distinct entities reachable from `entity_id` in `1..=max_hops` steps,
    /// ignoring edge direction, excluding the start entity.
    ///
    /// With `tenant_id`, only entities of that tenant are returned.
    async fn traverse(
        &self,
        entity_id: &str,
        max_hops: usize,
        tenant_id: Option<&str>,
    ) -> StoreResult<Vec<Entity>>;

    // === Bulk ===

    /// Detach-delete every node of the tenant; returns the node count before deletion.
    async fn delete_all_for_tenant(&self, tenant_id: &str) -> StoreResult<usize>;
}

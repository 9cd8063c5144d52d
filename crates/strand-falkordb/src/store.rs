//! `GraphStore` implementation over FalkorDB.

use crate::error::FalkorError;
use crate::protocol::{Reply, ResultSet};
use crate::query::{self, GraphCommand};
use crate::records::{entity_from_props, episode_from_props, relationship_from_props};
use crate::transport::{GraphTransport, RedisTransport};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strand_config::GraphStoreConfig;
use strand_core::{
    rank_by_similarity, validate_embedding, Entity, Episode, GraphStore, Relationship, Scored,
    StoreError, StoreResult, SIMILARITY_CANDIDATE_LIMIT,
};
use tracing::{debug, info, warn};

/// FalkorDB-backed graph store.
///
/// Holds at most one transport, created on first use (or injected with
/// [`FalkorGraphStore::with_transport`]) and shared by every call. After
/// [`close`](GraphStore::close) the store refuses further calls with
/// `StoreError::DependencyUnavailable`.
pub struct FalkorGraphStore {
    config: GraphStoreConfig,
    client: RwLock<Option<Arc<dyn GraphTransport>>>,
    /// Whether a missing client may be created by connecting
    lazy_connect: bool,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl FalkorGraphStore {
    /// Store that connects on first use.
    pub fn new(config: GraphStoreConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            lazy_connect: true,
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Store over an existing transport; never connects on its own.
    pub fn with_transport(config: GraphStoreConfig, transport: Arc<dyn GraphTransport>) -> Self {
        Self {
            config,
            client: RwLock::new(Some(transport)),
            lazy_connect: false,
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn graph_name(&self) -> &str {
        &self.config.graph_name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn client(&self) -> StoreResult<Arc<dyn GraphTransport>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FalkorError::Closed.into());
        }
        let existing = self.client.read().clone();
        if let Some(client) = existing {
            return Ok(client);
        }
        if !self.lazy_connect {
            return Err(StoreError::DependencyUnavailable(
                "no FalkorDB client configured".to_string(),
            ));
        }

        let connected: Arc<dyn GraphTransport> =
            Arc::new(RedisTransport::connect(&self.config).await?);
        // Another call may have connected while this one was waiting
        let mut slot = self.client.write();
        Ok(slot.get_or_insert(connected).clone())
    }

    async fn send(&self, args: Vec<String>) -> StoreResult<Reply> {
        let client = self.client().await?;
        Ok(client.execute(&args).await?)
    }

    async fn run(&self, command: GraphCommand) -> StoreResult<ResultSet> {
        debug!(
            command = command.command_name(),
            graph = %self.config.graph_name,
            query_len = command.query.len(),
            "Sending graph command"
        );
        let reply = self.send(command.to_args(&self.config.graph_name)).await?;
        Ok(ResultSet::from_reply(&reply)?)
    }

    async fn entities(&self, command: GraphCommand) -> StoreResult<Vec<Entity>> {
        let result = self.run(command).await?;
        Ok(result
            .records
            .iter()
            .filter_map(|r| r.get_map("props"))
            .map(entity_from_props)
            .collect())
    }

    async fn relationships(&self, command: GraphCommand) -> StoreResult<Vec<Relationship>> {
        let result = self.run(command).await?;
        Ok(result
            .records
            .iter()
            .filter_map(|r| {
                let props = r.get_map("rel")?;
                Some(relationship_from_props(
                    props,
                    r.get_str("source_id").unwrap_or_default(),
                    r.get_str("target_id").unwrap_or_default(),
                ))
            })
            .collect())
    }

    async fn episodes(&self, command: GraphCommand) -> StoreResult<Vec<Episode>> {
        let result = self.run(command).await?;
        Ok(result
            .records
            .iter()
            .filter_map(|r| r.get_map("props"))
            .map(episode_from_props)
            .collect())
    }

    async fn optional_setup(&self, args: Vec<String>) -> StoreResult<()> {
        match self.send(args).await? {
            Reply::Error(msg) => Err(FalkorError::Query(msg).into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl GraphStore for FalkorGraphStore {
    async fn initialize(&self) -> StoreResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        // Fails fast when there is no client at all
        self.client().await?;

        let config_args = ["GRAPH.CONFIG", "SET", "RESULTSET_FORMAT", "COMPACT"]
            .map(String::from)
            .to_vec();
        if let Err(e) = self.optional_setup(config_args).await {
            debug!(error = %e, "Unable to set FalkorDB result format");
        }

        let warm_up = query::warm_up().to_args(&self.config.graph_name);
        if let Err(e) = self.optional_setup(warm_up).await {
            warn!(error = %e, graph = %self.config.graph_name, "Graph warm-up query failed");
        }

        self.initialized.store(true, Ordering::Release);
        info!(graph = %self.config.graph_name, "FalkorDB graph store initialized");
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        self.initialized.store(false, Ordering::Release);
        let client = self.client.write().take();
        if let Some(client) = client {
            client.close().await?;
            info!(graph = %self.config.graph_name, "FalkorDB graph store closed");
        }
        Ok(())
    }

    async fn save_entity(&self, entity: &Entity) -> StoreResult<()> {
        validate_embedding(entity.embedding.as_deref())?;
        self.run(query::save_entity(entity)).await?;
        Ok(())
    }

    async fn get_entity(&self, entity_id: &str) -> StoreResult<Option<Entity>> {
        Ok(self.entities(query::get_entity(entity_id)).await?.into_iter().next())
    }

    async fn get_entities_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Entity>> {
        self.entities(query::entities_by_tenant(tenant_id, limit)).await
    }

    async fn find_entity_by_name_hash(
        &self,
        tenant_id: &str,
        name_hash: &str,
    ) -> StoreResult<Option<Entity>> {
        Ok(self
            .entities(query::find_entity_by_name_hash(tenant_id, name_hash))
            .await?
            .into_iter()
            .next())
    }

    async fn delete_entity(&self, entity_id: &str) -> StoreResult<bool> {
        let result = self.run(query::delete_entity(entity_id)).await?;
        Ok(result.stats.nodes_deleted > 0)
    }

    async fn save_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        validate_embedding(relationship.embedding.as_deref())?;
        let result = self.run(query::save_relationship(relationship)).await?;
        if result.stats.relationships_created == 0 && result.stats.properties_set == 0 {
            debug!(
                relationship_id = %relationship.id,
                "Relationship not written, endpoint missing"
            );
        }
        Ok(())
    }

    async fn get_relationship(&self, relationship_id: &str) -> StoreResult<Option<Relationship>> {
        Ok(self
            .relationships(query::get_relationship(relationship_id))
            .await?
            .into_iter()
            .next())
    }

    async fn get_relationships_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Relationship>> {
        self.relationships(query::relationships_by_tenant(tenant_id, limit))
            .await
    }

    async fn get_entity_relationships(&self, entity_id: &str) -> StoreResult<Vec<Relationship>> {
        self.relationships(query::entity_relationships(entity_id))
            .await
    }

    async fn delete_relationship(&self, relationship_id: &str) -> StoreResult<bool> {
        let result = self.run(query::delete_relationship(relationship_id)).await?;
        Ok(result.stats.relationships_deleted > 0)
    }

    async fn save_episode(&self, episode: &Episode) -> StoreResult<()> {
        self.run(query::save_episode(episode)).await?;
        Ok(())
    }

    async fn get_episode(&self, episode_id: &str) -> StoreResult<Option<Episode>> {
        Ok(self
            .episodes(query::get_episode(episode_id))
            .await?
            .into_iter()
            .next())
    }

    async fn get_episodes_by_tenant(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<Episode>> {
        self.episodes(query::episodes_by_tenant(tenant_id, limit))
            .await
    }

    async fn search_entities(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> StoreResult<Vec<Scored<Entity>>> {
        let candidates = self
            .get_entities_by_tenant(tenant_id, SIMILARITY_CANDIDATE_LIMIT)
            .await?;
        Ok(rank_by_similarity(candidates, query_embedding, limit, |e| {
            e.embedding.as_deref()
        }))
    }

    async fn search_relationships(
        &self,
        tenant_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> StoreResult<Vec<Scored<Relationship>>> {
        let candidates = self
            .get_relationships_by_tenant(tenant_id, SIMILARITY_CANDIDATE_LIMIT)
            .await?;
        Ok(rank_by_similarity(candidates, query_embedding, limit, |r| {
            r.embedding.as_deref()
        }))
    }

    async fn traverse(
        &self,
        entity_id: &str,
        max_hops: usize,
        tenant_id: Option<&str>,
    ) -> StoreResult<Vec<Entity>> {
        if max_hops == 0 {
            return Ok(Vec::new());
        }
        self.entities(query::traverse(entity_id, max_hops, tenant_id))
            .await
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> StoreResult<usize> {
        let counted = self.run(query::count_tenant_nodes(tenant_id)).await?;
        let count = counted
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0)
            .max(0) as usize;

        self.run(query::delete_tenant_nodes(tenant_id)).await?;
        info!(tenant_id, deleted = count, "Deleted tenant graph data");
        Ok(count)
    }
}

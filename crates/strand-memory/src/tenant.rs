//! Selector-based front over [`GraphMemory`].
//!
//! Each call resolves `{user, agent, session}` into one tenant key, scopes the
//! underlying call to it, and echoes the tenant description in the result.

use crate::error::MemoryResult;
use crate::orchestrator::{
    AddOptions, AddResult, DeleteAllResult, DeleteResult, EntityListing,
    EntityWithRelationships, EpisodeListing, GraphMemory, MemoryInput, RelatedEntities,
    RelationshipListing, SearchResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strand_core::{TenantInfo, TenantSelector};
use tracing::debug;

/// A result together with the tenant it was scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantScoped<T> {
    #[serde(flatten)]
    pub result: T,
    pub tenant: TenantInfo,
}

/// Multi-tenant graph memory: isolation by user, agent, or session.
///
/// Resolution order is session, then user+agent, then agent, then user; see
/// [`TenantId::resolve`](strand_core::TenantId::resolve).
#[derive(Clone)]
pub struct MultiTenantGraphMemory {
    memory: Arc<GraphMemory>,
}

impl MultiTenantGraphMemory {
    pub fn new(memory: GraphMemory) -> Self {
        Self {
            memory: Arc::new(memory),
        }
    }

    pub fn from_shared(memory: Arc<GraphMemory>) -> Self {
        Self { memory }
    }

    pub fn inner(&self) -> &GraphMemory {
        &self.memory
    }

    fn resolve(selector: &TenantSelector) -> MemoryResult<TenantInfo> {
        let (_, info) = TenantInfo::resolve(selector)?;
        debug!(
            tenant_id = %info.tenant_id,
            tenant_type = info.tenant_type.as_str(),
            "Resolved tenant"
        );
        Ok(info)
    }

    /// `add` with the tenant description merged into the episode metadata.
    ///
    /// Tenant keys win over caller keys of the same name.
    pub async fn add(
        &self,
        input: impl Into<MemoryInput>,
        selector: &TenantSelector,
        options: AddOptions,
    ) -> MemoryResult<TenantScoped<AddResult>> {
        let tenant = Self::resolve(selector)?;
        let mut options = options;
        options.metadata.extend(tenant.to_metadata());

        let result = self.memory.add(input, &tenant.tenant_id, options).await?;
        Ok(TenantScoped { result, tenant })
    }

    pub async fn search(
        &self,
        query: &str,
        selector: &TenantSelector,
        limit: Option<usize>,
    ) -> MemoryResult<TenantScoped<SearchResponse>> {
        let tenant = Self::resolve(selector)?;
        let result = self.memory.search(query, &tenant.tenant_id, limit).await?;
        Ok(TenantScoped { result, tenant })
    }

    /// Entities reachable from `entity_id` inside the tenant.
    pub async fn get_related(
        &self,
        entity_id: &str,
        hops: Option<usize>,
        selector: &TenantSelector,
    ) -> MemoryResult<TenantScoped<RelatedEntities>> {
        let tenant = Self::resolve(selector)?;
        let result = self
            .memory
            .get_related(entity_id, hops, Some(&tenant.tenant_id))
            .await?;
        Ok(TenantScoped { result, tenant })
    }

    pub async fn get_all_entities(
        &self,
        selector: &TenantSelector,
        limit: Option<usize>,
    ) -> MemoryResult<TenantScoped<EntityListing>> {
        let tenant = Self::resolve(selector)?;
        let result = self
            .memory
            .get_all_entities(&tenant.tenant_id, limit)
            .await?;
        Ok(TenantScoped { result, tenant })
    }

    pub async fn get_all_relationships(
        &self,
        selector: &TenantSelector,
        limit: Option<usize>,
    ) -> MemoryResult<TenantScoped<RelationshipListing>> {
        let tenant = Self::resolve(selector)?;
        let result = self
            .memory
            .get_all_relationships(&tenant.tenant_id, limit)
            .await?;
        Ok(TenantScoped { result, tenant })
    }

    pub async fn get_episodes(
        &self,
        selector: &TenantSelector,
        limit: Option<usize>,
    ) -> MemoryResult<TenantScoped<EpisodeListing>> {
        let tenant = Self::resolve(selector)?;
        let result = self.memory.get_episodes(&tenant.tenant_id, limit).await?;
        Ok(TenantScoped { result, tenant })
    }

    /// Lookup by id; ids are global, so no selector is needed.
    pub async fn get_entity(
        &self,
        entity_id: &str,
    ) -> MemoryResult<Option<EntityWithRelationships>> {
        self.memory.get_entity(entity_id).await
    }

    pub async fn delete(&self, entity_id: &str) -> MemoryResult<DeleteResult> {
        self.memory.delete(entity_id).await
    }

    pub async fn delete_all(
        &self,
        selector: &TenantSelector,
    ) -> MemoryResult<TenantScoped<DeleteAllResult>> {
        let tenant = Self::resolve(selector)?;
        let result = self.memory.delete_all(&tenant.tenant_id).await?;
        Ok(TenantScoped { result, tenant })
    }

    pub async fn close(&self) -> MemoryResult<()> {
        self.memory.close().await
    }
}

//! Tenant isolation through `MultiTenantGraphMemory`.

mod common;

use common::*;
use strand_core::{GraphStore, TenantSelector, TenantType};
use strand_memory::{AddOptions, MemoryError};

#[tokio::test]
async fn test_tenants_are_isolated() -> anyhow::Result<()> {
    let (memory, store, llm) = Harness::new().multi_tenant();
    let alice = TenantSelector::user("alice");
    let bob = TenantSelector::user("bob");

    script_add(&llm, ALICE_AT_ACME, WORKS_AT);
    let for_alice = memory
        .add("Alice works at Acme", &alice, AddOptions::default())
        .await?;
    script_add(&llm, ALICE_AT_ACME, WORKS_AT);
    let for_bob = memory
        .add("Alice works at Acme", &bob, AddOptions::default())
        .await?;

    // Same names, separate graphs
    assert_eq!(store.entity_count(), 4);
    let alice_ids: Vec<_> = for_alice.result.entities.iter().map(|e| &e.id).collect();
    assert!(for_bob
        .result
        .entities
        .iter()
        .all(|e| !alice_ids.contains(&&e.id)));

    let listing = memory.get_all_entities(&alice, None).await?;
    assert_eq!(listing.tenant.tenant_id, "user:alice");
    assert!(listing
        .result
        .entities
        .iter()
        .all(|e| e.tenant_id == "user:alice"));

    let found = memory.search("works at Acme", &bob, None).await?;
    assert!(!found.result.results.is_empty());
    let bob_rel = &for_bob.result.relationships[0].id;
    assert!(found.result.results.iter().all(|r| &r.id == bob_rel));

    let wiped = memory.delete_all(&bob).await?;
    assert_eq!(wiped.result.deleted_count, 3);
    assert_eq!(wiped.tenant.tenant_id, "user:bob");
    assert_eq!(memory.get_all_entities(&alice, None).await?.result.entities.len(), 2);
    assert!(memory.get_all_entities(&bob, None).await?.result.entities.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_fresh_tenant_sees_nothing() -> anyhow::Result<()> {
    let (memory, _store, llm) = Harness::new().multi_tenant();
    let alice = TenantSelector::user("alice");
    let bob = TenantSelector::user("bob");
    script_add(&llm, ALICE_AT_ACME, WORKS_AT);
    memory
        .add("Alice works at Acme", &alice, AddOptions::default())
        .await?;

    // Alice's own query finds the fact
    assert!(!memory
        .search("works at Acme", &alice, None)
        .await?
        .result
        .results
        .is_empty());

    let found = memory.search("works at Acme", &bob, None).await?;
    assert_eq!(found.tenant.tenant_id, "user:bob");
    assert!(found.result.results.is_empty());
    assert!(memory.get_all_entities(&bob, None).await?.result.entities.is_empty());
    assert!(memory
        .get_all_relationships(&bob, None)
        .await?
        .result
        .relationships
        .is_empty());
    assert!(memory.get_episodes(&bob, None).await?.result.episodes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_merges_tenant_metadata() -> anyhow::Result<()> {
    let (memory, store, llm) = Harness::new().multi_tenant();
    script_add(&llm, ALICE_AT_ACME, WORKS_AT);

    let mut metadata = strand_core::Metadata::new();
    metadata.insert("tenant_id".into(), "spoofed".into());
    metadata.insert("channel".into(), "email".into());
    let selector = TenantSelector::user("alice").with_agent("support-bot");

    let added = memory
        .add(
            "Alice works at Acme",
            &selector,
            AddOptions::default().with_metadata(metadata),
        )
        .await?;

    assert_eq!(added.tenant.tenant_id, "user:alice:agent:support-bot");
    assert_eq!(added.tenant.tenant_type, TenantType::Combined);

    let episode = store
        .get_episode(&added.result.episode_id)
        .await?
        .expect("episode");
    assert_eq!(episode.tenant_id, "user:alice:agent:support-bot");
    assert_eq!(episode.metadata["tenant_id"], "user:alice:agent:support-bot");
    assert_eq!(episode.metadata["tenant_type"], "combined");
    assert_eq!(episode.metadata["agent_id"], "support-bot");
    assert!(episode.metadata["session_id"].is_null());
    assert_eq!(episode.metadata["channel"], "email");
    Ok(())
}

#[tokio::test]
async fn test_session_scope_wins() -> anyhow::Result<()> {
    let (memory, _store, llm) = Harness::new().multi_tenant();
    script_add(&llm, ALICE_AT_ACME, WORKS_AT);
    let selector = TenantSelector::user("alice").with_session("sess-123");

    let added = memory
        .add("Alice works at Acme", &selector, AddOptions::default())
        .await?;
    assert_eq!(added.tenant.tenant_id, "session:sess-123");
    assert_eq!(added.tenant.tenant_type, TenantType::Session);
    assert!(added
        .result
        .entities
        .iter()
        .all(|e| e.tenant_id == "session:sess-123"));

    // Nothing leaked into the user scope
    let user_view = memory
        .get_all_entities(&TenantSelector::user("alice"), None)
        .await?;
    assert!(user_view.result.entities.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_agent_memory_is_shared_across_users() -> anyhow::Result<()> {
    let (memory, _store, llm) = Harness::new().multi_tenant();
    script_add(&llm, ALICE_AT_ACME, WORKS_AT);
    let agent = TenantSelector::agent("support-bot");

    memory
        .add("Alice works at Acme", &agent, AddOptions::default())
        .await?;
    let relationships = memory.get_all_relationships(&agent, None).await?;
    assert_eq!(relationships.tenant.tenant_id, "agent:support-bot");
    assert_eq!(relationships.tenant.tenant_type, TenantType::Agent);
    assert_eq!(relationships.result.relationships.len(), 1);
    let episodes = memory.get_episodes(&agent, None).await?;
    assert_eq!(episodes.result.episodes.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_related_is_tenant_scoped() -> anyhow::Result<()> {
    let (memory, _store, llm) = Harness::new().multi_tenant();
    let alice = TenantSelector::user("alice");
    script_add(&llm, ALICE_AT_ACME, WORKS_AT);
    let added = memory
        .add("Alice works at Acme", &alice, AddOptions::default())
        .await?;
    let alice_entity = added
        .result
        .entities
        .iter()
        .find(|e| e.name == "Alice")
        .expect("alice");

    let related = memory
        .get_related(&alice_entity.id, Some(2), &alice)
        .await?;
    assert_eq!(related.result.entities.len(), 1);
    assert_eq!(related.result.entities[0].name, "Acme");

    let other = memory
        .get_related(&alice_entity.id, Some(2), &TenantSelector::user("mallory"))
        .await?;
    assert!(other.result.entities.is_empty());

    let detail = memory.get_entity(&alice_entity.id).await?.expect("stored");
    assert_eq!(detail.relationships.len(), 1);
    assert!(memory.delete(&alice_entity.id).await?.success);
    Ok(())
}

#[tokio::test]
async fn test_missing_identifier_is_rejected() {
    let (memory, store, llm) = Harness::new().multi_tenant();

    let err = memory
        .add("hello", &TenantSelector::default(), AddOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::TenantResolution(_)));

    // Empty strings count as absent
    let blank = TenantSelector::user("");
    assert!(matches!(
        memory.search("hello", &blank, None).await,
        Err(MemoryError::TenantResolution(_))
    ));
    assert_eq!(llm.call_count(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_scoped_results_serialize_flat() -> anyhow::Result<()> {
    let (memory, _store, _llm) = Harness::new().multi_tenant();
    let wiped = memory.delete_all(&TenantSelector::user("alice")).await?;

    let json = serde_json::to_value(&wiped)?;
    assert_eq!(json["success"], true);
    assert_eq!(json["deleted_count"], 0);
    assert_eq!(json["tenant"]["tenant_id"], "user:alice");
    assert_eq!(json["tenant"]["tenant_type"], "user");
    Ok(())
}

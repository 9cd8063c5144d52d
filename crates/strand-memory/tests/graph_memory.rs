//! `GraphMemory` end to end over the in-memory store.

mod common;

use common::*;
use std::sync::Arc;
use strand_config::GraphConfig;
use strand_core::test_support::FailingEmbedder;
use strand_core::{Entity, EntityType, GraphStore, Relationship};
use strand_memory::{AddOptions, MemoryError, Turn, ENTITY_RELATION_TYPE};
use tracing_test::traced_test;

const ALICE: &str = "user:alice";

#[tokio::test]
async fn test_add_then_search_and_traverse() -> anyhow::Result<()> {
    let h = Harness::new();

    h.script_add(ALICE_AT_ACME, WORKS_AT);
    let first = h
        .memory
        .add(
            vec![
                Turn::user("I'm Alice and I work at Acme"),
                Turn::assistant("Nice to meet you"),
            ],
            ALICE,
            AddOptions::default(),
        )
        .await?;
    assert_eq!(first.entities.len(), 2);
    assert_eq!(first.relationships.len(), 1);
    assert_eq!(first.relationships[0].relation_type, "works_at");

    h.script_add(ALICE_AND_BOB, FRIENDS_WITH);
    let second = h
        .memory
        .add("Alice is friends with Bob", ALICE, AddOptions::default())
        .await?;
    // Alice is already known with the same summary; only Bob is new
    assert_eq!(second.entities.len(), 1);
    assert_eq!(second.entities[0].name, "Bob");
    assert_eq!(h.store.entity_count(), 3);
    assert_eq!(h.store.relationship_count(), 2);
    assert_eq!(h.store.episode_count(), 2);

    // The second relationship call saw the first fact as known
    let calls = h.llm.call_history();
    assert_eq!(calls.len(), 4);
    assert!(calls[0]
        .user_prompt
        .contains("User: I'm Alice and I work at Acme\nAssistant: Nice to meet you"));
    assert!(calls[3].system_prompt.contains("- Alice works at Acme"));

    let search = h.memory.search("Who is Bob?", ALICE, Some(1)).await?;
    assert_eq!(search.results.len(), 1);
    let hit = &search.results[0];
    assert_eq!(hit.relation_type, "friends_with");
    assert_eq!(hit.fact, "Alice is friends with Bob");
    assert_eq!(hit.source_entity, "Alice");
    assert_eq!(hit.target_entity, "Bob");

    let alice_id = first
        .entities
        .iter()
        .find(|e| e.name == "Alice")
        .map(|e| e.id.clone())
        .expect("alice extracted");
    let alice = h.memory.get_entity(&alice_id).await?.expect("alice stored");
    assert_eq!(alice.relationships.len(), 2);

    let related = h.memory.get_related(&alice_id, None, Some(ALICE)).await?;
    let mut names: Vec<_> = related.entities.iter().map(|e| e.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Acme", "Bob"]);
    Ok(())
}

#[tokio::test]
async fn test_search_orders_by_score_and_respects_limit() -> anyhow::Result<()> {
    let h = Harness::new();
    h.script_add(ALICE_AT_ACME, WORKS_AT);
    h.memory.add("Alice works at Acme", ALICE, AddOptions::default()).await?;
    h.script_add(ALICE_AND_BOB, FRIENDS_WITH);
    h.memory.add("Alice is friends with Bob", ALICE, AddOptions::default()).await?;

    let search = h.memory.search("Who is Bob?", ALICE, None).await?;
    assert_eq!(search.results.len(), 2);
    assert!(search.results[0].score >= search.results[1].score);
    assert_eq!(search.results[0].relation_type, "friends_with");

    assert!(h.memory.search("Who is Bob?", ALICE, Some(0)).await?.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_search_falls_back_to_entities() -> anyhow::Result<()> {
    let h = Harness::new();
    h.script_add(ALICE_AT_ACME, NO_RELATIONSHIPS);
    h.memory.add("Alice and Acme", ALICE, AddOptions::default()).await?;

    let search = h.memory.search("rocket company", ALICE, Some(1)).await?;
    assert_eq!(search.results.len(), 1);
    let hit = &search.results[0];
    assert_eq!(hit.relation_type, ENTITY_RELATION_TYPE);
    assert_eq!(hit.fact, "Acme: A rocket company");
    assert_eq!(hit.source_entity, "Acme");
    assert_eq!(hit.target_entity, "");
    Ok(())
}

#[tokio::test]
async fn test_episode_records_source_metadata_and_ids() -> anyhow::Result<()> {
    let h = Harness::new();
    h.script_add(ALICE_AT_ACME, WORKS_AT);

    let mut metadata = strand_core::Metadata::new();
    metadata.insert("channel".into(), "slack".into());
    let added = h
        .memory
        .add(
            "Alice works at Acme",
            ALICE,
            AddOptions::default()
                .with_metadata(metadata)
                .with_source("import"),
        )
        .await?;

    let episode = h
        .store
        .get_episode(&added.episode_id)
        .await?
        .expect("episode stored");
    assert_eq!(episode.content, "Alice works at Acme");
    assert_eq!(episode.source, "import");
    assert_eq!(episode.metadata["channel"], "slack");
    assert_eq!(episode.entity_ids.len(), 2);
    assert_eq!(episode.relationship_ids, vec![added.relationships[0].id.clone()]);
    Ok(())
}

#[tokio::test]
async fn test_episode_content_can_be_withheld() -> anyhow::Result<()> {
    let config = GraphConfig {
        store_episode_content: false,
        ..GraphConfig::in_memory()
    };
    let h = Harness::with_config(config);
    h.script_add(ALICE_AT_ACME, WORKS_AT);

    let added = h
        .memory
        .add("Alice works at Acme", ALICE, AddOptions::default())
        .await?;
    let episode = h.store.get_episode(&added.episode_id).await?.expect("episode");
    assert_eq!(episode.content, "");
    assert_eq!(episode.source, "message");
    // Extraction still ran on the full text
    assert_eq!(added.entities.len(), 2);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_malformed_model_output_still_records_episode() -> anyhow::Result<()> {
    let h = Harness::new();
    h.llm.push_response("Sorry, I can't help with that.");

    let added = h
        .memory
        .add("Alice works at Acme", ALICE, AddOptions::default())
        .await?;

    assert!(added.entities.is_empty());
    assert!(added.relationships.is_empty());
    assert_eq!(h.store.episode_count(), 1);
    // No entities, so no relationship call
    assert_eq!(h.llm.call_count(), 1);
    assert!(logs_contain("Malformed model output"));
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_unknown_relationship_endpoints_are_discarded() -> anyhow::Result<()> {
    let h = Harness::new();
    h.script_add(
        ALICE_AT_ACME,
        r#"{"relationships": [
            {"source": "Alice", "target": "Acme", "relation_type": "works_at", "fact": "Alice works at Acme"},
            {"source": "Alice", "target": "Zed", "relation_type": "knows", "fact": "Alice knows Zed"}
        ]}"#,
    );

    let added = h
        .memory
        .add("Alice works at Acme and knows Zed", ALICE, AddOptions::default())
        .await?;
    assert_eq!(added.relationships.len(), 1);
    assert!(logs_contain("Discarding relationships that reference unknown entities"));
    Ok(())
}

#[tokio::test]
async fn test_blank_input_skips_extraction() -> anyhow::Result<()> {
    let h = Harness::new();
    let added = h.memory.add("   ", ALICE, AddOptions::default()).await?;
    assert!(added.entities.is_empty());
    assert_eq!(h.llm.call_count(), 0);
    assert_eq!(h.store.episode_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_get_related_clamps_hops() -> anyhow::Result<()> {
    let h = Harness::new();
    let chain: Vec<Entity> = (0..6)
        .map(|i| Entity::new(ALICE, format!("Node {i}"), EntityType::Concept, ""))
        .collect();
    h.store.save_entities(&chain).await?;
    for pair in chain.windows(2) {
        h.store
            .save_relationship(&Relationship::new(
                ALICE,
                &pair[0].id,
                &pair[1].id,
                "next",
                "next",
            ))
            .await?;
    }

    // Default ceiling is 3
    let related = h.memory.get_related(&chain[0].id, Some(10), None).await?;
    assert_eq!(related.entities.len(), 3);
    assert!(related.entities.iter().all(|e| e.id != chain[0].id));

    let related = h.memory.get_related(&chain[0].id, Some(1), None).await?;
    assert_eq!(related.entities.len(), 1);
    assert_eq!(related.entities[0].id, chain[1].id);

    // Default depth is 2
    let related = h.memory.get_related(&chain[0].id, None, None).await?;
    assert_eq!(related.entities.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_delete_and_delete_all() -> anyhow::Result<()> {
    let h = Harness::new();
    h.script_add(ALICE_AT_ACME, WORKS_AT);
    let added = h.memory.add("Alice works at Acme", ALICE, AddOptions::default()).await?;

    let missing = h.memory.delete("no-such-entity").await?;
    assert!(!missing.success);
    assert_eq!(missing.message, "Entity not found");

    let acme = added
        .entities
        .iter()
        .find(|e| e.name == "Acme")
        .expect("acme extracted");
    let deleted = h.memory.delete(&acme.id).await?;
    assert!(deleted.success);
    assert_eq!(deleted.message, "Entity deleted");
    assert!(h.memory.get_entity(&acme.id).await?.is_none());
    // The edge went with it
    assert_eq!(h.store.relationship_count(), 0);

    // Alice plus one episode remain
    let wiped = h.memory.delete_all(ALICE).await?;
    assert!(wiped.success);
    assert_eq!(wiped.deleted_count, 2);
    assert!(h.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_listings() -> anyhow::Result<()> {
    let h = Harness::new();
    h.script_add(ALICE_AT_ACME, WORKS_AT);
    h.memory.add("Alice works at Acme", ALICE, AddOptions::default()).await?;

    assert_eq!(h.memory.get_all_entities(ALICE, None).await?.entities.len(), 2);
    assert_eq!(h.memory.get_all_entities(ALICE, Some(1)).await?.entities.len(), 1);
    assert_eq!(
        h.memory.get_all_relationships(ALICE, None).await?.relationships.len(),
        1
    );
    assert_eq!(h.memory.get_episodes(ALICE, None).await?.episodes.len(), 1);
    assert!(h.memory.get_all_entities("user:nobody", None).await?.entities.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_embedding_failure_propagates_and_saves_nothing() {
    let h = Harness::with_parts(GraphConfig::in_memory(), Arc::new(FailingEmbedder));
    h.script_add(ALICE_AT_ACME, WORKS_AT);

    let err = h
        .memory
        .add("Alice works at Acme", ALICE, AddOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::Provider(_)));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_from_config_builds_memory_backend() -> anyhow::Result<()> {
    let llm = Arc::new(strand_core::test_support::MockTextGenerator::new());
    let memory = strand_memory::GraphMemory::from_config(
        GraphConfig::in_memory(),
        llm,
        Arc::new(strand_core::test_support::HashingEmbedder::default()),
    )
    .await?;
    assert!(memory.get_all_entities(ALICE, None).await?.entities.is_empty());
    memory.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = GraphConfig {
        max_traversal_hops: 0,
        ..GraphConfig::in_memory()
    };
    let result = strand_memory::GraphMemory::from_config(
        config,
        Arc::new(strand_core::test_support::MockTextGenerator::new()),
        Arc::new(strand_core::test_support::HashingEmbedder::default()),
    )
    .await;
    assert!(matches!(result, Err(MemoryError::Configuration(_))));
}

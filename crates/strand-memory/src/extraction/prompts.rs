//! Prompt templates for the two extraction calls.
//!
//! Both system prompts ask for strict JSON; the conversation text goes in
//! the user prompt.

use strand_core::{Entity, EntityType};

/// Fact lines shown to the model as already known.
pub const MAX_KNOWN_FACTS: usize = 20;

/// Relation types suggested to the model.
pub const COMMON_RELATION_TYPES: &[&str] = &[
    "works_at, employed_by",
    "lives_in, located_in",
    "likes, dislikes, prefers",
    "knows, friends_with",
    "uses, built_with",
    "owns, created_by",
    "part_of, member_of",
];

/// System prompt for entity extraction.
pub fn entity_system_prompt(max_entities: usize) -> String {
    let types = EntityType::ALL
        .iter()
        .map(EntityType::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an entity extraction system. Extract named entities from the conversation.

For each entity, provide:
- name: The entity name (proper noun, normalized)
- type: One of: {types}
- summary: Brief description based on context (1 sentence max)

Rules:
1. Extract specific, named entities only (not generic terms like "the company")
2. Normalize names (e.g., "John" and "John Smith" referring to same person = "John Smith")
3. Include entities mentioned by any speaker
4. Maximum {max_entities} entities

Respond with JSON only:
{{
    "entities": [
        {{"name": "John Smith", "type": "person", "summary": "A software developer"}},
        {{"name": "Acme Corp", "type": "company", "summary": "John's employer"}}
    ]
}}"#
    )
}

/// System prompt for relationship extraction among `entities`.
///
/// `known_facts` are listed so the model can avoid restating them; at most
/// [`MAX_KNOWN_FACTS`] are included.
pub fn relationship_system_prompt(
    entities: &[Entity],
    known_facts: &[String],
    max_relationships: usize,
) -> String {
    let entity_lines = entities
        .iter()
        .map(|e| format!("- {} ({})", e.name, e.entity_type))
        .collect::<Vec<_>>()
        .join("\n");
    let relation_lines = COMMON_RELATION_TYPES
        .iter()
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    let known = if known_facts.is_empty() {
        String::new()
    } else {
        let lines = known_facts
            .iter()
            .take(MAX_KNOWN_FACTS)
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nAlready known facts (do not repeat these):\n{lines}\n")
    };

    format!(
        r#"You are a relationship extraction system. Given entities and conversation, extract relationships between them.

Known entities:
{entity_lines}
{known}
For each relationship, provide:
- source: Source entity name (must be from the list above)
- target: Target entity name (must be from the list above)
- relation_type: Relationship type (lowercase, underscore-separated)
- fact: Human-readable fact sentence

Common relation types:
{relation_lines}

Rules:
1. Only use entities from the provided list
2. Each relationship should be a clear fact from the conversation
3. Avoid duplicate or redundant relationships
4. Maximum {max_relationships} relationships

Respond with JSON only:
{{
    "relationships": [
        {{
            "source": "John Smith",
            "target": "Acme Corp",
            "relation_type": "works_at",
            "fact": "John Smith works at Acme Corp"
        }}
    ]
}}"#
    )
}

/// User prompt carrying the conversation text.
pub fn conversation_prompt(content: &str) -> String {
    format!("Conversation:\n{content}")
}

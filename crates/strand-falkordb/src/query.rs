//! Cypher command construction.
//!
//! Literals are inlined rather than sent as parameters: strings are escaped
//! (`\` → `\\`, `'` → `\'`, control characters → `\n`, `\r`, `\t` or
//! `\uXXXX`) and single-quoted, numbers and booleans are bare, lists become
//! `[..]`, and maps are JSON-encoded then quoted. Compaction only touches the
//! query text outside string literals. Every write merges on `id`, so
//! replaying a save is idempotent.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use strand_core::{Entity, Episode, Metadata, Relationship};

/// Property holding the tenant key on every node and edge.
pub const TENANT_PROPERTY: &str = "tenant_id";

/// Label of entity nodes.
pub const ENTITY_LABEL: &str = "Entity";

/// Label of episode nodes.
pub const EPISODE_LABEL: &str = "Episode";

/// Type of relationship edges.
pub const RELATIONSHIP_TYPE: &str = "RELATES_TO";

/// One graph command, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphCommand {
    pub query: String,
    /// Sent as `GRAPH.RO_QUERY` when true, `GRAPH.QUERY` otherwise
    pub read_only: bool,
}

impl GraphCommand {
    pub fn read(query: impl AsRef<str>) -> Self {
        Self {
            query: compact(query.as_ref()),
            read_only: true,
        }
    }

    pub fn write(query: impl AsRef<str>) -> Self {
        Self {
            query: compact(query.as_ref()),
            read_only: false,
        }
    }

    pub fn command_name(&self) -> &'static str {
        if self.read_only {
            "GRAPH.RO_QUERY"
        } else {
            "GRAPH.QUERY"
        }
    }

    /// Full argument vector: `[command, graph, query, "--compact"]`.
    pub fn to_args(&self, graph_name: &str) -> Vec<String> {
        vec![
            self.command_name().to_string(),
            graph_name.to_string(),
            self.query.clone(),
            "--compact".to_string(),
        ]
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
///
/// Single-quoted literals (with backslash escapes) are copied unchanged.
pub fn compact(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut in_literal = false;
    let mut escaped = false;
    let mut pending_space = false;

    for ch in query.chars() {
        if in_literal {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_literal = false;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if ch == '\'' {
            in_literal = true;
        }
        out.push(ch);
    }
    out
}

/// Escape and single-quote a string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render a JSON value as a Cypher literal.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(_) => quote(&value.to_string()),
    }
}

/// `alias.key = literal, ...` in the given order.
pub fn set_clause(alias: &str, props: &[(&str, Value)]) -> String {
    props
        .iter()
        .map(|(key, value)| format!("{alias}.{key} = {}", format_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fixed-width RFC 3339 (nanoseconds, `Z`) so string order is time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Callers reject non-finite components first (see
/// [`validate_embedding`](strand_core::validate_embedding)); JSON has no NaN.
fn embedding_value(embedding: &Option<Vec<f32>>) -> Value {
    Value::Array(
        embedding
            .iter()
            .flatten()
            .map(|x| Value::from(f64::from(*x)))
            .collect(),
    )
}

fn metadata_value(metadata: &Metadata) -> Value {
    Value::String(Value::Object(metadata.clone()).to_string())
}

fn string_list(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

// === Entities ===

pub fn save_entity(entity: &Entity) -> GraphCommand {
    let props = [
        (TENANT_PROPERTY, Value::from(entity.tenant_id.as_str())),
        ("name", Value::from(entity.name.as_str())),
        ("name_hash", Value::from(entity.name_hash.as_str())),
        ("entity_type", Value::from(entity.entity_type.as_str())),
        ("summary", Value::from(entity.summary.as_str())),
        ("embedding", embedding_value(&entity.embedding)),
        ("metadata", metadata_value(&entity.metadata)),
        ("created_at", Value::from(format_timestamp(&entity.created_at))),
        ("updated_at", Value::from(format_timestamp(&entity.updated_at))),
    ];
    GraphCommand::write(format!(
        "MERGE (e:{ENTITY_LABEL} {{id: {id}}})
         SET {set}",
        id = quote(&entity.id),
        set = set_clause("e", &props),
    ))
}

pub fn get_entity(entity_id: &str) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (e:{ENTITY_LABEL} {{id: {id}}})
         RETURN properties(e) as props
         LIMIT 1",
        id = quote(entity_id),
    ))
}

pub fn entities_by_tenant(tenant_id: &str, limit: usize) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (e:{ENTITY_LABEL} {{{TENANT_PROPERTY}: {tenant}}})
         RETURN properties(e) as props
         ORDER BY e.created_at DESC
         LIMIT {limit}",
        tenant = quote(tenant_id),
    ))
}

pub fn find_entity_by_name_hash(tenant_id: &str, name_hash: &str) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (e:{ENTITY_LABEL} {{
             {TENANT_PROPERTY}: {tenant},
             name_hash: {hash}
         }})
         RETURN properties(e) as props
         LIMIT 1",
        tenant = quote(tenant_id),
        hash = quote(name_hash),
    ))
}

pub fn delete_entity(entity_id: &str) -> GraphCommand {
    GraphCommand::write(format!(
        "MATCH (e:{ENTITY_LABEL} {{id: {id}}})
         DETACH DELETE e",
        id = quote(entity_id),
    ))
}

// === Relationships ===

const RELATIONSHIP_COLUMNS: &str = "properties(r) as rel, source.id as source_id, target.id as target_id";

pub fn save_relationship(rel: &Relationship) -> GraphCommand {
    let props = [
        (TENANT_PROPERTY, Value::from(rel.tenant_id.as_str())),
        ("relation_type", Value::from(rel.relation_type.as_str())),
        ("fact", Value::from(rel.fact.as_str())),
        ("fact_hash", Value::from(rel.fact_hash.as_str())),
        ("embedding", embedding_value(&rel.embedding)),
        ("metadata", metadata_value(&rel.metadata)),
        ("created_at", Value::from(format_timestamp(&rel.created_at))),
        ("updated_at", Value::from(format_timestamp(&rel.updated_at))),
    ];
    GraphCommand::write(format!(
        "MATCH (source:{ENTITY_LABEL} {{id: {source}}})
         MATCH (target:{ENTITY_LABEL} {{id: {target}}})
         MERGE (source)-[r:{RELATIONSHIP_TYPE} {{id: {id}}}]->(target)
         SET {set}",
        source = quote(&rel.source_id),
        target = quote(&rel.target_id),
        id = quote(&rel.id),
        set = set_clause("r", &props),
    ))
}

pub fn get_relationship(relationship_id: &str) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (source:{ENTITY_LABEL})-[r:{RELATIONSHIP_TYPE} {{id: {id}}}]->(target:{ENTITY_LABEL})
         RETURN {RELATIONSHIP_COLUMNS}
         LIMIT 1",
        id = quote(relationship_id),
    ))
}

pub fn relationships_by_tenant(tenant_id: &str, limit: usize) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (source:{ENTITY_LABEL})-[r:{RELATIONSHIP_TYPE} {{
             {TENANT_PROPERTY}: {tenant}
         }}]->(target:{ENTITY_LABEL})
         RETURN {RELATIONSHIP_COLUMNS}
         ORDER BY r.created_at DESC
         LIMIT {limit}",
        tenant = quote(tenant_id),
    ))
}

/// Incident in either direction; endpoints come from `startNode`/`endNode`.
pub fn entity_relationships(entity_id: &str) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (e:{ENTITY_LABEL} {{id: {id}}})-[r:{RELATIONSHIP_TYPE}]-(other:{ENTITY_LABEL})
         RETURN
             properties(r) as rel,
             startNode(r).id as source_id,
             endNode(r).id as target_id
         ORDER BY r.created_at DESC",
        id = quote(entity_id),
    ))
}

pub fn delete_relationship(relationship_id: &str) -> GraphCommand {
    GraphCommand::write(format!(
        "MATCH ()-[r:{RELATIONSHIP_TYPE} {{id: {id}}}]->()
         DELETE r",
        id = quote(relationship_id),
    ))
}

// === Episodes ===

pub fn save_episode(episode: &Episode) -> GraphCommand {
    let props = [
        (TENANT_PROPERTY, Value::from(episode.tenant_id.as_str())),
        ("content", Value::from(episode.content.as_str())),
        ("source", Value::from(episode.source.as_str())),
        ("entity_ids", string_list(&episode.entity_ids)),
        ("relationship_ids", string_list(&episode.relationship_ids)),
        ("metadata", metadata_value(&episode.metadata)),
        ("created_at", Value::from(format_timestamp(&episode.created_at))),
    ];
    GraphCommand::write(format!(
        "MERGE (ep:{EPISODE_LABEL} {{id: {id}}})
         SET {set}",
        id = quote(&episode.id),
        set = set_clause("ep", &props),
    ))
}

pub fn get_episode(episode_id: &str) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (ep:{EPISODE_LABEL} {{id: {id}}})
         RETURN properties(ep) as props
         LIMIT 1",
        id = quote(episode_id),
    ))
}

pub fn episodes_by_tenant(tenant_id: &str, limit: usize) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (ep:{EPISODE_LABEL} {{{TENANT_PROPERTY}: {tenant}}})
         RETURN properties(ep) as props
         ORDER BY ep.created_at DESC
         LIMIT {limit}",
        tenant = quote(tenant_id),
    ))
}

// === Traversal and bulk ===

/// Variable-length path `1..max_hops`, start node excluded.
pub fn traverse(entity_id: &str, max_hops: usize, tenant_id: Option<&str>) -> GraphCommand {
    let tenant_filter = tenant_id
        .map(|t| format!("AND e.{TENANT_PROPERTY} = {}", quote(t)))
        .unwrap_or_default();
    GraphCommand::read(format!(
        "MATCH (start:{ENTITY_LABEL} {{id: {id}}})
         MATCH path = (start)-[:{RELATIONSHIP_TYPE}*1..{max_hops}]-(e:{ENTITY_LABEL})
         WHERE e.id <> start.id {tenant_filter}
         RETURN DISTINCT properties(e) as props",
        id = quote(entity_id),
    ))
}

pub fn count_tenant_nodes(tenant_id: &str) -> GraphCommand {
    GraphCommand::read(format!(
        "MATCH (n {{{TENANT_PROPERTY}: {tenant}}})
         RETURN count(n) as cnt",
        tenant = quote(tenant_id),
    ))
}

pub fn delete_tenant_nodes(tenant_id: &str) -> GraphCommand {
    GraphCommand::write(format!(
        "MATCH (n {{{TENANT_PROPERTY}: {tenant}}})
         DETACH DELETE n",
        tenant = quote(tenant_id),
    ))
}

/// Touches the graph so it exists before the first write.
pub fn warm_up() -> GraphCommand {
    GraphCommand::write("RETURN 1")
}

//! Property maps → model records.
//!
//! Decoding is lenient: a missing string is empty, an empty or
//! absent embedding is `None`, unparseable metadata is an empty map, and an
//! unparseable timestamp falls back to now.

use crate::protocol::{GraphValue, PropertyMap};
use crate::query::TENANT_PROPERTY;
use chrono::{DateTime, NaiveDateTime, Utc};
use strand_core::{EntityType, Entity, Episode, Metadata, Relationship};
use tracing::debug;

fn text(props: &PropertyMap, key: &str) -> String {
    match props.get(key) {
        Some(GraphValue::String(s)) => s.clone(),
        Some(GraphValue::Integer(i)) => i.to_string(),
        Some(GraphValue::Double(d)) => d.to_string(),
        Some(GraphValue::Boolean(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn metadata(props: &PropertyMap) -> Metadata {
    match props.get("metadata") {
        Some(GraphValue::String(raw)) if !raw.is_empty() => {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Object(map)) => map,
                _ => {
                    debug!("Ignoring non-object metadata");
                    Metadata::new()
                }
            }
        }
        Some(GraphValue::Map(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect(),
        _ => Metadata::new(),
    }
}

fn to_json(value: &GraphValue) -> serde_json::Value {
    match value {
        GraphValue::Null => serde_json::Value::Null,
        GraphValue::String(s) => serde_json::Value::String(s.clone()),
        GraphValue::Integer(i) => serde_json::Value::from(*i),
        GraphValue::Boolean(b) => serde_json::Value::Bool(*b),
        GraphValue::Double(d) => serde_json::Value::from(*d),
        GraphValue::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        GraphValue::Map(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

fn embedding(props: &PropertyMap) -> Option<Vec<f32>> {
    let floats: Vec<f32> = match props.get("embedding") {
        Some(GraphValue::Array(items)) => items
            .iter()
            .filter_map(GraphValue::as_f64)
            .map(|x| x as f32)
            .collect(),
        // Older writers stored the vector as a JSON string
        Some(GraphValue::String(raw)) if !raw.is_empty() => {
            serde_json::from_str::<Vec<f64>>(raw)
                .map(|v| v.into_iter().map(|x| x as f32).collect())
                .unwrap_or_default()
        }
        _ => Vec::new(),
    };
    Some(floats).filter(|f| !f.is_empty())
}

fn string_list(props: &PropertyMap, key: &str) -> Vec<String> {
    match props.get(key) {
        Some(GraphValue::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                GraphValue::String(s) => Some(s.clone()),
                GraphValue::Integer(i) => Some(i.to_string()),
                _ => None,
            })
            .collect(),
        Some(GraphValue::String(raw)) if !raw.is_empty() => {
            serde_json::from_str(raw).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn timestamp(props: &PropertyMap, key: &str) -> DateTime<Utc> {
    let raw = text(props, key);
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return ts.with_timezone(&Utc);
    }
    // Naive ISO-8601 without offset is taken as UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }
    debug!(key, value = %raw, "Unparseable timestamp, using now");
    Utc::now()
}

pub(crate) fn entity_from_props(props: &PropertyMap) -> Entity {
    Entity {
        id: text(props, "id"),
        tenant_id: text(props, TENANT_PROPERTY),
        name: text(props, "name"),
        name_hash: text(props, "name_hash"),
        entity_type: EntityType::from_label(&text(props, "entity_type")),
        summary: text(props, "summary"),
        embedding: embedding(props),
        metadata: metadata(props),
        created_at: timestamp(props, "created_at"),
        updated_at: timestamp(props, "updated_at"),
    }
}

pub(crate) fn relationship_from_props(
    props: &PropertyMap,
    source_id: &str,
    target_id: &str,
) -> Relationship {
    Relationship {
        id: text(props, "id"),
        tenant_id: text(props, TENANT_PROPERTY),
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        relation_type: text(props, "relation_type"),
        fact: text(props, "fact"),
        fact_hash: text(props, "fact_hash"),
        embedding: embedding(props),
        metadata: metadata(props),
        created_at: timestamp(props, "created_at"),
        updated_at: timestamp(props, "updated_at"),
    }
}

pub(crate) fn episode_from_props(props: &PropertyMap) -> Episode {
    let source = text(props, "source");
    Episode {
        id: text(props, "id"),
        tenant_id: text(props, TENANT_PROPERTY),
        content: text(props, "content"),
        source: if source.is_empty() {
            Episode::DEFAULT_SOURCE.to_string()
        } else {
            source
        },
        entity_ids: string_list(props, "entity_ids"),
        relationship_ids: string_list(props, "relationship_ids"),
        metadata: metadata(props),
        created_at: timestamp(props, "created_at"),
    }
}

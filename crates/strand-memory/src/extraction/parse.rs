//! Parsing model output into raw extraction records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use strand_core::EntityType;
use thiserror::Error;
use tracing::debug;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Relation type used when the model gives none.
pub const FALLBACK_RELATION_TYPE: &str = "related_to";

/// Model output that could not be read as the requested JSON shape.
///
/// Never leaves the pipeline: the step degrades to an empty result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFormatError {
    #[error("no JSON object in model output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing `{0}` list")]
    MissingList(&'static str),
}

/// One entity as the model reported it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEntity {
    pub name: String,
    #[serde(default, rename = "type", alias = "entity_type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub summary: String,
}

/// One relationship as the model reported it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRelationship {
    pub source: String,
    pub target: String,
    #[serde(default, alias = "type")]
    pub relation_type: String,
    #[serde(default)]
    pub fact: String,
}

/// Pull the JSON object out of a reply that may wrap it in prose or a
/// markdown code fence.
pub fn extract_json(content: &str) -> Result<&str, ExtractionFormatError> {
    if let Some(start) = content.find("```") {
        let after_fence = start + 3;
        // Skip the language tag on the fence line
        let body_start = content[after_fence..]
            .find('\n')
            .map_or(after_fence, |n| after_fence + n + 1);
        if let Some(end) = content[body_start..].find("```") {
            let body = content[body_start..body_start + end].trim();
            if body.starts_with('{') {
                return Ok(body);
            }
        }
    }

    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&content[start..=end]),
        _ => Err(ExtractionFormatError::NoJson),
    }
}

fn items(content: &str, key: &'static str) -> Result<Vec<Value>, ExtractionFormatError> {
    let json = extract_json(content)?;
    let mut value: Value = serde_json::from_str(json)
        .map_err(|e| ExtractionFormatError::InvalidJson(e.to_string()))?;
    match value.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(ExtractionFormatError::MissingList(key)),
    }
}

/// Parse `{"entities": [...]}`, dropping entries without a usable name.
pub fn parse_entities(content: &str) -> Result<Vec<RawEntity>, ExtractionFormatError> {
    let raw = items(content, "entities")?;
    Ok(raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawEntity>(item) {
            Ok(mut entity) => {
                entity.name = entity.name.trim().to_string();
                entity.summary = entity.summary.trim().to_string();
                Some(entity).filter(|e| !e.name.is_empty())
            }
            Err(e) => {
                debug!(error = %e, "Skipping malformed entity entry");
                None
            }
        })
        .collect())
}

/// Parse `{"relationships": [...]}`, dropping entries without both endpoints.
pub fn parse_relationships(content: &str) -> Result<Vec<RawRelationship>, ExtractionFormatError> {
    let raw = items(content, "relationships")?;
    Ok(raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawRelationship>(item) {
            Ok(mut rel) => {
                rel.source = rel.source.trim().to_string();
                rel.target = rel.target.trim().to_string();
                rel.fact = rel.fact.trim().to_string();
                rel.relation_type = snake_case(&rel.relation_type);
                Some(rel).filter(|r| !r.source.is_empty() && !r.target.is_empty())
            }
            Err(e) => {
                debug!(error = %e, "Skipping malformed relationship entry");
                None
            }
        })
        .collect())
}

/// Lowercase, with every run of non-alphanumerics collapsed to `_`.
///
/// `"Works At"` and `"works-at"` both become `works_at`.
pub fn snake_case(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let snake = NON_WORD.replace_all(&lowered, "_");
    let snake = snake.trim_matches('_');
    if snake.is_empty() {
        FALLBACK_RELATION_TYPE.to_string()
    } else {
        snake.to_string()
    }
}

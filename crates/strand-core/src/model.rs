//! Graph data model: entities, relationships, episodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Open key-value metadata attached to every record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// New opaque record id (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trim, lowercase, and collapse internal whitespace.
///
/// `"  Acme   Corp "` and `"acme corp"` normalize to the same string.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 hex digest of the normalized name; the exact-lookup key.
pub fn name_hash(name: &str) -> String {
    sha256_hex(&normalize_name(name))
}

/// SHA-256 hex digest of the normalized fact sentence.
pub fn fact_hash(fact: &str) -> String {
    sha256_hex(&normalize_name(fact))
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Entity category. Unrecognized labels map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Company,
    Technology,
    Place,
    Product,
    Event,
    Concept,
    #[default]
    Other,
}

impl EntityType {
    /// Every category, in prompt order.
    pub const ALL: [EntityType; 8] = [
        Self::Person,
        Self::Company,
        Self::Technology,
        Self::Place,
        Self::Product,
        Self::Event,
        Self::Concept,
        Self::Other,
    ];

    /// Lenient parse; never fails.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "person" => Self::Person,
            "company" => Self::Company,
            "technology" => Self::Technology,
            "place" => Self::Place,
            "product" => Self::Product,
            "event" => Self::Event,
            "concept" => Self::Concept,
            _ => Self::Other,
        }
    }

    /// Lowercase label as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Company => "company",
            Self::Technology => "technology",
            Self::Place => "place",
            Self::Product => "product",
            Self::Event => "event",
            Self::Concept => "concept",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}

/// A named real-world thing mentioned in conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub name_hash: String,
    pub entity_type: EntityType,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Fresh entity with a new id and `name_hash` derived from `name`.
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        entity_type: EntityType,
        summary: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: generate_id(),
            tenant_id: tenant_id.into(),
            name_hash: name_hash(&name),
            name,
            entity_type,
            summary: summary.into(),
            embedding: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text embedded for similarity: `"name: summary"`, or just the name.
    pub fn embedding_text(&self) -> String {
        if self.summary.is_empty() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, self.summary)
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Directed, typed edge between two entities of the same tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub tenant_id: String,
    pub source_id: String,
    pub target_id: String,
    /// Lowercase snake token, e.g. `works_at`
    pub relation_type: String,
    /// Human-readable sentence
    pub fact: String,
    pub fact_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(
        tenant_id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: impl Into<String>,
        fact: impl Into<String>,
    ) -> Self {
        let fact = fact.into();
        let now = Utc::now();
        Self {
            id: generate_id(),
            tenant_id: tenant_id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type: relation_type.into(),
            fact_hash: fact_hash(&fact),
            fact,
            embedding: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether `entity_id` is either endpoint.
    pub fn touches(&self, entity_id: &str) -> bool {
        self.source_id == entity_id || self.target_id == entity_id
    }
}

/// Immutable record of one extraction event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub tenant_id: String,
    /// Raw text, or empty when content storage is off
    pub content: String,
    /// Origin tag, `message` unless the caller says otherwise
    pub source: String,
    pub entity_ids: Vec<String>,
    pub relationship_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Episode {
    /// Default episode source tag.
    pub const DEFAULT_SOURCE: &'static str = "message";

    pub fn new(
        tenant_id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            tenant_id: tenant_id.into(),
            content: content.into(),
            source: source.into(),
            entity_ids: Vec::new(),
            relationship_ids: Vec::new(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }
}

//! Entity and relationship extraction.
//!
//! The language model is asked twice per message: once for entities, once for
//! relationships among the resolved entities. Entities are deduplicated
//! against the tenant's existing graph before relationships are extracted.

mod parse;
mod pipeline;
pub mod prompts;

pub use parse::{
    extract_json, parse_entities, parse_relationships, snake_case, ExtractionFormatError,
    RawEntity, RawRelationship, FALLBACK_RELATION_TYPE,
};
pub use pipeline::{Extraction, ExtractionRequest, ExtractionSettings, GraphExtractor};

//! Cosine similarity and brute-force top-K ranking.

use crate::error::{StoreError, StoreResult};
use std::cmp::Ordering;

/// Cosine similarity of two vectors.
///
/// Returns 0.0 for empty or mismatched inputs and when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Reject embeddings with a NaN or infinite component.
///
/// Both stores call this before persisting an entity or relationship.
pub fn validate_embedding(embedding: Option<&[f32]>) -> StoreResult<()> {
    let Some(embedding) = embedding else {
        return Ok(());
    };
    match embedding.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(StoreError::InvalidOperation(format!(
            "embedding component {index} is not finite ({})",
            embedding[index]
        ))),
        None => Ok(()),
    }
}

/// An item paired with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Score every item that has an embedding, sort descending, keep `limit`.
///
/// Items without an embedding are skipped. The sort is stable, so equal scores
/// keep their input order.
pub fn rank_by_similarity<T, F>(
    items: impl IntoIterator<Item = T>,
    query: &[f32],
    limit: usize,
    embedding_of: F,
) -> Vec<Scored<T>>
where
    F: Fn(&T) -> Option<&[f32]>,
{
    let mut scored: Vec<Scored<T>> = items
        .into_iter()
        .filter_map(|item| {
            let score = cosine_similarity(embedding_of(&item)?, query);
            Some(Scored { item, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

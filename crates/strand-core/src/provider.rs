//! Capability contracts for the language model and the embedder.
//!
//! Concrete clients live outside this workspace; callers hand the memory
//! engine `Arc<dyn TextGenerator>` and `Arc<dyn Embedder>`.

use crate::error::ProviderResult;
use async_trait::async_trait;

/// Text generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `user_prompt` under `system_prompt` and return the raw text.
    ///
    /// Extraction prompts ask for strict JSON, but implementations return
    /// whatever the model produced; parsing is the caller's concern.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> ProviderResult<String>;
}

/// Embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into a fixed-length vector.
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    /// Embed several texts. Default: one call per text, in order.
    async fn embed_batch(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

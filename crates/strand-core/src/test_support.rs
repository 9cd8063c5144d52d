//! Deterministic capability mocks for tests.
//!
//! Enabled with the `test-utils` feature.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Embedder, TextGenerator};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One recorded `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Scripted text generator.
///
/// Answers come from, in order: a rule whose needle appears in the system
/// prompt, the FIFO queue, then the default response.
pub struct MockTextGenerator {
    rules: Mutex<Vec<(String, String)>>,
    queue: Mutex<VecDeque<Result<String, String>>>,
    default_response: String,
    call_history: Mutex<Vec<GenerateCall>>,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            default_response: "{}".to_string(),
            call_history: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call whose system prompt contains `needle` with `response`.
    pub fn respond_when(&self, needle: &str, response: impl Into<String>) {
        self.rules.lock().push((needle.to_string(), response.into()));
    }

    /// Queue a response for the next unmatched call.
    pub fn push_response(&self, response: impl Into<String>) {
        self.queue.lock().push_back(Ok(response.into()));
    }

    /// Queue a failure for the next unmatched call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.queue.lock().push_back(Err(message.into()));
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn call_history(&self) -> Vec<GenerateCall> {
        self.call_history.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_history.lock().len()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> ProviderResult<String> {
        self.call_history.lock().push(GenerateCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });

        if let Some((_, response)) = self
            .rules
            .lock()
            .iter()
            .find(|(needle, _)| system_prompt.contains(needle.as_str()))
        {
            return Ok(response.clone());
        }

        match self.queue.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ProviderError::Generation(message)),
            None => Ok(self.default_response.clone()),
        }
    }
}

/// Bag-of-words embedder: each lowercase alphanumeric token is hashed into a
/// bucket, and the counts are L2-normalized.
///
/// Texts sharing words get positive similarity; identical texts score 1.0.
pub struct HashingEmbedder {
    dimensions: usize,
    calls: Mutex<Vec<String>>,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Every text embedded so far.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Pure embedding, no call recording.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn fnv1a(input: &str) -> u64 {
    input.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.calls.lock().push(text.to_string());
        Ok(self.vector_for(text))
    }
}

/// Embedder that always fails; for error-path tests.
#[derive(Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
        Err(ProviderError::Embedding("embedding service offline".into()))
    }
}

//! Embedding trait definitions.

use async_trait::async_trait;

use crate::error::{EmbeddingError, Result};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate one embedding per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::CountMismatch { expected: 1, got: 0 }.into())
    }

    /// Return the maximum batch size.
    fn max_batch_size(&self) -> usize {
        32
    }

    /// Provider name for logs and health output.
    fn name(&self) -> &str {
        "embedding"
    }
}

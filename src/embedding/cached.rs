//! Memoising decorator for embedding providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::error::{EmbeddingError, Result};
use crate::metrics::get_metrics;

use super::EmbeddingProvider;

/// Hash key for the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EmbeddingKey {
    text: String,
    model: String,
}

/// Wraps a provider and serves repeated texts from memory.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache<EmbeddingKey, Arc<Vec<f32>>>,
    model: String,
}

impl CachedEmbedder {
    pub fn new(
        inner: Arc<dyn EmbeddingProvider>,
        model: impl Into<String>,
        max_entries: u64,
        ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            inner,
            cache,
            model: model.into(),
        }
    }

    fn key(&self, text: &str) -> EmbeddingKey {
        EmbeddingKey {
            text: text.to_string(),
            model: self.model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let metrics = get_metrics();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut to_embed: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(cached) = self.cache.get(&self.key(text)).await {
                metrics.embedding_cache_hits_total.inc();
                results[i] = Some((*cached).clone());
            } else {
                metrics.embedding_cache_misses_total.inc();
                to_embed.push((i, text.clone()));
            }
        }

        if !to_embed.is_empty() {
            let pending: Vec<String> = to_embed.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = self.inner.embed(&pending).await?;
            if embeddings.len() != pending.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: pending.len(),
                    got: embeddings.len(),
                }
                .into());
            }

            for ((idx, text), embedding) in to_embed.into_iter().zip(embeddings) {
                self.cache
                    .insert(self.key(&text), Arc::new(embedding.clone()))
                    .await;
                results[idx] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        texts_seen: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn test_repeated_text_served_from_cache() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            texts_seen: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), "m", 100, Duration::from_secs(60));

        let first = cached.embed(&["ab".to_string()]).await.unwrap();
        let second = cached
            .embed(&["ab".to_string(), "abcd".to_string()])
            .await
            .unwrap();

        assert_eq!(first, vec![vec![2.0]]);
        assert_eq!(second, vec![vec![2.0], vec![4.0]]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.texts_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_embed_one() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            texts_seen: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner, "m", 100, Duration::from_secs(60));
        assert_eq!(cached.embed_one("abc").await.unwrap(), vec![3.0]);
    }
}

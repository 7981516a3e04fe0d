//! Embedding providers for query vectors.
//!
//! - [`HttpEmbeddingProvider`]: remote inference endpoint, batched requests.
//! - [`CachedEmbedder`]: moka-backed memoisation around any provider.

mod api;
mod cached;
mod traits;

pub use api::HttpEmbeddingProvider;
pub use cached::CachedEmbedder;
pub use traits::EmbeddingProvider;

use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::Result;

/// Create an embedding provider from configuration.
///
/// Returns `Ok(None)` when no endpoint is configured.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    if config.endpoint.is_empty() {
        return Ok(None);
    }

    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::from_config(config)?);
    if config.cache_entries == 0 {
        return Ok(Some(provider));
    }

    let model = config.model.clone().unwrap_or_else(|| config.endpoint.clone());
    Ok(Some(Arc::new(CachedEmbedder::new(
        provider,
        model,
        config.cache_entries,
        Duration::from_secs(3600),
    ))))
}

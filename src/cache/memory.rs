//! In-process search cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use crate::config::CacheConfig;
use crate::error::Result;

use super::{CacheStats, SearchCache, StoredSearch};

/// Bounded, TTL-evicted cache of search responses.
#[derive(Clone)]
pub struct MemorySearchCache {
    entries: Cache<String, Arc<StoredSearch>>,
    ttl_secs: u64,
}

impl MemorySearchCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self {
            entries,
            ttl_secs: config.ttl_secs,
        }
    }
}

#[async_trait]
impl SearchCache for MemorySearchCache {
    async fn save(&self, record: StoredSearch) -> Result<String> {
        let search_id = record.search_id.clone();
        self.entries
            .insert(search_id.clone(), Arc::new(record))
            .await;
        Ok(search_id)
    }

    async fn load(&self, search_id: &str) -> Result<Option<StoredSearch>> {
        Ok(self
            .entries
            .get(search_id)
            .await
            .map(|record| (*record).clone()))
    }

    async fn delete(&self, search_id: &str) -> Result<bool> {
        Ok(self.entries.remove(search_id).await.is_some())
    }

    async fn stats(&self) -> Result<CacheStats> {
        self.entries.run_pending_tasks().await;
        Ok(CacheStats {
            backend: self.name().to_string(),
            entries: self.entries.entry_count(),
            ttl_secs: self.ttl_secs,
            location: None,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

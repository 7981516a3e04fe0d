//! Persistence of search responses under an opaque search id.
//!
//! Backends:
//! - [`MemorySearchCache`]: moka, bounded and TTL-evicted, lost on restart.
//! - [`S3SearchCache`]: one JSON object per search at `<prefix>/<id>.json`.

mod memory;
mod s3;

pub use memory::MemorySearchCache;
pub use s3::S3SearchCache;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{CacheBackendType, CacheConfig};
use crate::error::Result;
use crate::models::{SearchResponse, SearchResult, SearchType};

/// A persisted search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSearch {
    pub search_id: String,
    pub query: String,
    pub search_type: SearchType,
    pub enable_llm: bool,
    pub total_results: u64,
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub rewritten_terms: Option<Vec<String>>,
    /// RFC 3339 creation time.
    pub timestamp: String,
    /// Unix seconds at creation.
    pub created_at: i64,
}

impl StoredSearch {
    /// Snapshot `response` under a fresh v4 UUID.
    pub fn new(query: &str, enable_llm: bool, response: &SearchResponse) -> Self {
        let now = Utc::now();
        Self {
            search_id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            search_type: response.search_type,
            enable_llm,
            total_results: response.total,
            results: response.results.clone(),
            rewritten_terms: response.rewritten_terms.clone(),
            timestamp: now.to_rfc3339(),
            created_at: now.timestamp(),
        }
    }

    /// The record without its results.
    pub fn metadata(&self) -> StoredSearchMetadata {
        StoredSearchMetadata {
            search_id: self.search_id.clone(),
            query: self.query.clone(),
            search_type: self.search_type,
            enable_llm: self.enable_llm,
            total_results: self.total_results,
            results_count: self.results.len(),
            rewritten_terms: self.rewritten_terms.clone(),
            timestamp: self.timestamp.clone(),
            created_at: self.created_at,
        }
    }

    /// Rebuild the response as it was returned.
    pub fn into_response(self) -> SearchResponse {
        SearchResponse {
            total: self.total_results,
            results: self.results,
            search_type: self.search_type,
            rewritten_terms: self.rewritten_terms,
            search_id: Some(self.search_id),
        }
    }

    /// Whether the record is older than `ttl_secs`.
    pub fn is_expired(&self, ttl_secs: u64, now: i64) -> bool {
        now.saturating_sub(self.created_at) > ttl_secs as i64
    }
}

/// A persisted search without its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSearchMetadata {
    pub search_id: String,
    pub query: String,
    pub search_type: SearchType,
    pub enable_llm: bool,
    pub total_results: u64,
    pub results_count: usize,
    pub rewritten_terms: Option<Vec<String>>,
    pub timestamp: String,
    pub created_at: i64,
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub backend: String,
    /// Number of stored searches.
    pub entries: u64,
    pub ttl_secs: u64,
    /// Bucket and prefix for remote backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Store for search responses.
#[async_trait]
pub trait SearchCache: Send + Sync {
    /// Persist a record and return its search id.
    async fn save(&self, record: StoredSearch) -> Result<String>;

    /// Load a record. Unknown or expired ids give `None`.
    async fn load(&self, search_id: &str) -> Result<Option<StoredSearch>>;

    /// Load a record's metadata.
    async fn metadata(&self, search_id: &str) -> Result<Option<StoredSearchMetadata>> {
        Ok(self.load(search_id).await?.map(|r| r.metadata()))
    }

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, search_id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<CacheStats>;

    /// Backend name (`memory`, `s3`).
    fn name(&self) -> &str;
}

/// Create the configured cache backend, or `None` when caching is off.
pub async fn create_cache(config: &CacheConfig) -> Result<Option<Arc<dyn SearchCache>>> {
    match config.backend {
        CacheBackendType::None => Ok(None),
        CacheBackendType::Memory => Ok(Some(Arc::new(MemorySearchCache::new(config)))),
        CacheBackendType::S3 => Ok(Some(Arc::new(S3SearchCache::new(config).await?))),
    }
}

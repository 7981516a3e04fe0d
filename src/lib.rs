//! litsearch: medical literature search service
//!
//! Answers free-text queries against a document index using keyword, vector
//! or hybrid retrieval, with LLM query expansion, cross-encoder reranking, an
//! optional LLM relevance gate and persistence of responses under a search id.

pub mod api;
pub mod cache;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod search;

pub use api::{create_router, ApiState};
pub use cache::{
    create_cache, CacheStats, MemorySearchCache, S3SearchCache, SearchCache, StoredSearch,
    StoredSearchMetadata,
};
pub use capability::Capability;
pub use config::Config;
pub use coordinator::{ServiceCoordinator, ServiceStatus};
pub use embedding::{create_provider, CachedEmbedder, EmbeddingProvider, HttpEmbeddingProvider};
pub use engine::{EngineHit, EngineResponse, OpenSearchEngine, SearchEngine};
pub use error::{Result, SearchServiceError};
pub use llm::ChatClient;
pub use metrics::{get_metrics, HealthCheck, HealthState, Metrics, MetricsSnapshot};
pub use models::{SearchRequest, SearchResponse, SearchResult, SearchType, MAX_PAGE_SIZE};
pub use search::{
    QueryBuilder, QueryDescriptor, QueryExpander, RelevanceEvaluator, RerankService,
    RetrievalDispatcher, SearchOrchestrator, SearchOrchestratorBuilder, Strategy,
};

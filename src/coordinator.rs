//! Service coordinator: resolves every collaborator once from configuration
//! and exposes the operations the REST API and CLI need.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{create_cache, CacheStats, SearchCache, StoredSearchMetadata};
use crate::config::{CacheBackendType, Config};
use crate::embedding::create_provider;
use crate::engine::OpenSearchEngine;
use crate::error::{Result, SearchServiceError};
use crate::llm::ChatClient;
use crate::metrics::{get_metrics, overall_state, HealthCheck, HealthState};
use crate::models::{SearchRequest, SearchResponse};
use crate::search::{
    CrossEncoderReranker, LlmQueryExpander, LlmRelevanceEvaluator, PassthroughExpander,
    SearchOrchestrator,
};

/// Availability of each collaborator, as reported by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: HealthState,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub engine: bool,
    pub embedder: bool,
    pub reranker: bool,
    pub llm: bool,
    pub cache: bool,
    pub cache_type: String,
    pub checks: Vec<HealthCheck>,
}

/// Owns the orchestrator and the configuration it was built from.
pub struct ServiceCoordinator {
    config: Config,
    orchestrator: SearchOrchestrator,
}

impl ServiceCoordinator {
    /// Build every collaborator from configuration.
    ///
    /// A collaborator that is not configured or fails to initialise is left
    /// absent; the pipeline degrades instead of refusing to start.
    pub async fn new(config: Config) -> Result<Self> {
        let mut builder = SearchOrchestrator::builder()
            .tuning(config.search.clone())
            .relevance_concurrency(config.llm.max_concurrency);

        if config.engine.host.is_empty() {
            warn!("No search engine host configured");
        } else {
            match OpenSearchEngine::from_config(&config.engine) {
                Ok(engine) => {
                    info!(url = %config.engine.base_url(), index = %config.engine.index, "Search engine configured");
                    builder = builder.engine(Arc::new(engine));
                }
                Err(e) => warn!(error = %e, "Search engine unavailable"),
            }
        }

        match create_provider(&config.embedding) {
            Ok(Some(embedder)) => {
                info!(endpoint = %config.embedding.endpoint, "Embedding service configured");
                builder = builder.embedder(embedder);
            }
            Ok(None) => warn!("No embedding endpoint configured, vector and hybrid search disabled"),
            Err(e) => warn!(error = %e, "Embedding service unavailable"),
        }

        if config.rerank.enabled && !config.rerank.endpoint.is_empty() {
            match CrossEncoderReranker::from_config(&config.rerank) {
                Ok(reranker) => {
                    info!(model = %config.rerank.model, "Reranker configured");
                    builder = builder.reranker(Arc::new(reranker));
                }
                Err(e) => warn!(error = %e, "Reranker unavailable"),
            }
        }

        match ChatClient::from_config(&config.llm) {
            Ok(Some(client)) => {
                let client = Arc::new(client);
                info!(model = %config.llm.model, "LLM configured");
                builder = builder.relevance_evaluator(Arc::new(LlmRelevanceEvaluator::new(
                    client.clone(),
                    config.llm.temperature,
                    config.llm.max_tokens,
                )));
                builder = if config.expansion.enabled {
                    builder.expander(Arc::new(LlmQueryExpander::new(
                        client,
                        config.expansion.temperature,
                        config.expansion.max_tokens,
                        config.expansion.min_query_chars,
                    )))
                } else {
                    builder.expander(Arc::new(PassthroughExpander))
                };
            }
            Ok(None) => warn!("No LLM credential configured, query expansion and relevance gate disabled"),
            Err(e) => warn!(error = %e, "LLM unavailable, query expansion and relevance gate disabled"),
        }

        match create_cache(&config.cache).await {
            Ok(Some(cache)) => {
                info!(backend = cache.name(), "Result cache configured");
                builder = builder.cache(cache);
            }
            Ok(None) => info!("Result cache disabled"),
            Err(e) => warn!(error = %e, "Result cache unavailable"),
        }

        Ok(Self {
            config,
            orchestrator: builder.build(),
        })
    }

    /// Wrap an already-built orchestrator.
    pub fn from_parts(config: Config, orchestrator: SearchOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        self.orchestrator.search(request).await
    }

    fn cache(&self) -> Result<&Arc<dyn SearchCache>> {
        self.orchestrator
            .cache()
            .get()
            .ok_or(SearchServiceError::Unavailable("result cache"))
    }

    /// A stored response by search id.
    pub async fn cached(&self, search_id: &str) -> Result<Option<SearchResponse>> {
        Ok(self
            .orchestrator
            .load_cached(search_id)
            .await?
            .map(|record| record.into_response()))
    }

    pub async fn cached_metadata(&self, search_id: &str) -> Result<Option<StoredSearchMetadata>> {
        self.cache()?.metadata(search_id).await
    }

    pub async fn delete_cached(&self, search_id: &str) -> Result<bool> {
        self.cache()?.delete(search_id).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.cache()?.stats().await
    }

    /// Collaborator availability plus a live engine ping.
    pub async fn status(&self) -> ServiceStatus {
        let dispatcher = self.orchestrator.dispatcher();
        let mut checks = Vec::new();

        match dispatcher.engine().get() {
            Some(engine) => {
                let start = Instant::now();
                match engine.ping().await {
                    Ok(()) => checks.push(HealthCheck::healthy_with_duration(
                        "engine",
                        start.elapsed().as_millis() as u64,
                    )),
                    Err(e) => checks.push(HealthCheck::unhealthy("engine", e.to_string())),
                }
            }
            None => checks.push(HealthCheck::unhealthy("engine", "not configured")),
        }

        let optional = [
            ("embedder", dispatcher.embedder().is_present()),
            ("reranker", dispatcher.reranker().is_present()),
            ("llm", dispatcher.relevance().is_available()),
            ("cache", self.orchestrator.cache().is_present()),
        ];
        for (name, present) in optional {
            checks.push(if present {
                HealthCheck::healthy(name)
            } else {
                HealthCheck::degraded(name, "not available")
            });
        }

        let cache_type = match self.orchestrator.cache().get() {
            Some(cache) => cache.name().to_string(),
            None => match self.config.cache.backend {
                CacheBackendType::None => "none".to_string(),
                _ => "unavailable".to_string(),
            },
        };

        ServiceStatus {
            status: overall_state(&checks),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.config.server.environment.clone(),
            uptime_seconds: get_metrics().uptime().as_secs(),
            engine: dispatcher.engine().is_present(),
            embedder: dispatcher.embedder().is_present(),
            reranker: dispatcher.reranker().is_present(),
            llm: dispatcher.relevance().is_available(),
            cache: self.orchestrator.cache().is_present(),
            cache_type,
            checks,
        }
    }
}

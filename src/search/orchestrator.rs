//! Top-level search entry point.
//!
//! `search` never fails: any error inside the pipeline is logged and turned
//! into the empty response for the requested search type.

use std::borrow::Cow;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{error, info, warn};

use crate::cache::{SearchCache, StoredSearch};
use crate::capability::Capability;
use crate::config::SearchTuning;
use crate::embedding::EmbeddingProvider;
use crate::engine::SearchEngine;
use crate::error::Result;
use crate::metrics::{get_metrics, Metrics};
use crate::models::{SearchRequest, SearchResponse};

use super::dispatcher::RetrievalDispatcher;
use super::expansion::{expand_or_original, PassthroughExpander, QueryExpander};
use super::relevance::{RelevanceEvaluator, RelevanceGate};
use super::reranker::RerankService;

/// Percent-decode a query. `+` stays literal; invalid UTF-8 keeps the raw query.
pub fn decode_query(raw: &str) -> Cow<'_, str> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Query is not valid percent-encoded UTF-8, using it as is");
            Cow::Borrowed(raw)
        }
    }
}

/// Coordinates expansion, retrieval and persistence for one request.
pub struct SearchOrchestrator {
    expander: Arc<dyn QueryExpander>,
    dispatcher: RetrievalDispatcher,
    cache: Capability<dyn SearchCache>,
}

impl SearchOrchestrator {
    pub fn builder() -> SearchOrchestratorBuilder {
        SearchOrchestratorBuilder::default()
    }

    pub fn dispatcher(&self) -> &RetrievalDispatcher {
        &self.dispatcher
    }

    pub fn cache(&self) -> &Capability<dyn SearchCache> {
        &self.cache
    }

    pub fn expander(&self) -> &dyn QueryExpander {
        self.expander.as_ref()
    }

    /// Answer one search request.
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let metrics = get_metrics();
        metrics.search_queries_total.inc();
        let _timer = Metrics::start_timer(&metrics.search_duration_seconds);

        let query = decode_query(&request.query);
        if query.is_empty() {
            return SearchResponse::empty(request.search_type);
        }

        match self.run(&query, request).await {
            Ok(response) => response,
            Err(e) => {
                metrics.search_errors_total.inc();
                error!(
                    search_type = %request.search_type,
                    query = %query,
                    error = %e,
                    "Search failed"
                );
                SearchResponse::empty(request.search_type)
            }
        }
    }

    async fn run(&self, query: &str, request: &SearchRequest) -> Result<SearchResponse> {
        // The query is known non-empty here; this checks page bounds.
        SearchRequest {
            query: query.to_string(),
            ..request.clone()
        }
        .validate()?;

        info!(
            search_type = %request.search_type,
            query,
            enable_llm = request.enable_llm,
            "Search started"
        );

        let terms = expand_or_original(self.expander.as_ref(), query).await;
        let mut response = self.dispatcher.dispatch(query, &terms, request).await?;
        response.search_id = self.persist(query, request, &response).await;

        info!(
            search_type = %request.search_type,
            count = response.results.len(),
            total = response.total,
            search_id = response.search_id.as_deref().unwrap_or("-"),
            "Search complete"
        );
        Ok(response)
    }

    /// Best-effort cache write. Returns the new search id on success.
    async fn persist(
        &self,
        query: &str,
        request: &SearchRequest,
        response: &SearchResponse,
    ) -> Option<String> {
        let cache = self.cache.get()?;
        let metrics = get_metrics();
        let record = StoredSearch::new(query, request.enable_llm, response);

        match cache.save(record).await {
            Ok(search_id) => {
                metrics.cache_writes_total.inc();
                Some(search_id)
            }
            Err(e) => {
                metrics.cache_write_failures_total.inc();
                warn!(cache = cache.name(), error = %e, "Failed to persist search response");
                None
            }
        }
    }

    /// Load a previously persisted response.
    pub async fn load_cached(&self, search_id: &str) -> Result<Option<StoredSearch>> {
        match self.cache.get() {
            Some(cache) => cache.load(search_id).await,
            None => Ok(None),
        }
    }
}

/// Builder for [`SearchOrchestrator`]. Every collaborator is optional.
#[derive(Default)]
pub struct SearchOrchestratorBuilder {
    engine: Capability<dyn SearchEngine>,
    embedder: Capability<dyn EmbeddingProvider>,
    reranker: Capability<dyn RerankService>,
    evaluator: Capability<dyn RelevanceEvaluator>,
    relevance_concurrency: Option<usize>,
    expander: Option<Arc<dyn QueryExpander>>,
    cache: Capability<dyn SearchCache>,
    tuning: Option<SearchTuning>,
}

impl SearchOrchestratorBuilder {
    pub fn engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.engine = Capability::present(engine);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Capability::present(embedder);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn RerankService>) -> Self {
        self.reranker = Capability::present(reranker);
        self
    }

    pub fn relevance_evaluator(mut self, evaluator: Arc<dyn RelevanceEvaluator>) -> Self {
        self.evaluator = Capability::present(evaluator);
        self
    }

    /// Candidates judged at once by the relevance gate (default 1).
    pub fn relevance_concurrency(mut self, concurrency: usize) -> Self {
        self.relevance_concurrency = Some(concurrency);
        self
    }

    pub fn expander(mut self, expander: Arc<dyn QueryExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn SearchCache>) -> Self {
        self.cache = Capability::present(cache);
        self
    }

    pub fn tuning(mut self, tuning: SearchTuning) -> Self {
        self.tuning = Some(tuning);
        self
    }

    pub fn build(self) -> SearchOrchestrator {
        let tuning = self.tuning.unwrap_or_default();
        let relevance =
            RelevanceGate::new(self.evaluator, self.relevance_concurrency.unwrap_or(1));

        SearchOrchestrator {
            expander: self
                .expander
                .unwrap_or_else(|| Arc::new(PassthroughExpander)),
            dispatcher: RetrievalDispatcher::new(
                self.engine,
                self.embedder,
                self.reranker,
                relevance,
                &tuning,
            ),
            cache: self.cache,
        }
    }
}

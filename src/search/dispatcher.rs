//! Strategy dispatch: executes one query against the engine and applies the
//! strategy's post-processing.
//!
//! | strategy | embedder | matched keywords | relevance gate | supplementation | rerank | total |
//! |----------|----------|------------------|----------------|-----------------|--------|-------|
//! | keyword  | optional | yes              | supplement only| yes             | yes    | local |
//! | vector   | required | no               | yes            | no              | no     | local |
//! | hybrid   | required | yes              | no             | no              | yes    | engine|

use std::collections::HashSet;

use tracing::{debug, info};

use crate::capability::Capability;
use crate::config::SearchTuning;
use crate::embedding::EmbeddingProvider;
use crate::engine::{EngineHit, EngineResponse, SearchEngine};
use crate::error::{Result, SearchServiceError};
use crate::metrics::{get_metrics, Metrics};
use crate::models::{SearchRequest, SearchResponse, SearchResult, SearchType};

use super::fusion::{fuse, sort_by_score};
use super::highlight::matched_keywords;
use super::query_builder::{Pagination, QueryBuilder, QueryDescriptor};
use super::relevance::RelevanceGate;
use super::reranker::{rerank_results, RerankService};

/// How a strategy reports `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSemantics {
    /// The engine's own hit count, before the engine's fusion step.
    EngineReported,
    /// Length of the final local result list.
    LocalCount,
}

/// The three retrieval strategies and their post-processing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Keyword,
    Vector,
    Hybrid,
}

impl From<SearchType> for Strategy {
    fn from(search_type: SearchType) -> Self {
        match search_type {
            SearchType::Keyword => Strategy::Keyword,
            SearchType::Vector => Strategy::Vector,
            SearchType::Hybrid => Strategy::Hybrid,
        }
    }
}

impl Strategy {
    pub fn source(self) -> SearchType {
        match self {
            Strategy::Keyword => SearchType::Keyword,
            Strategy::Vector => SearchType::Vector,
            Strategy::Hybrid => SearchType::Hybrid,
        }
    }

    /// The raw query must be embedded before the main query runs.
    pub fn requires_embedder(self) -> bool {
        matches!(self, Strategy::Vector | Strategy::Hybrid)
    }

    /// Hits carry matched keywords.
    pub fn annotates_matches(self) -> bool {
        matches!(self, Strategy::Keyword | Strategy::Hybrid)
    }

    /// Main hits pass through the relevance gate.
    pub fn gates_relevance(self) -> bool {
        matches!(self, Strategy::Vector)
    }

    /// Short result lists are topped up with vector candidates.
    pub fn supplements(self) -> bool {
        matches!(self, Strategy::Keyword)
    }

    pub fn reranks(self) -> bool {
        matches!(self, Strategy::Keyword | Strategy::Hybrid)
    }

    /// Results are cut to one page after fusion.
    pub fn truncates_to_page(self) -> bool {
        matches!(self, Strategy::Hybrid)
    }

    pub fn total_semantics(self) -> TotalSemantics {
        match self {
            Strategy::Hybrid => TotalSemantics::EngineReported,
            Strategy::Keyword | Strategy::Vector => TotalSemantics::LocalCount,
        }
    }

    fn descriptor(
        self,
        builder: &QueryBuilder,
        embedding: Option<&[f32]>,
        terms: &[String],
        page: Pagination,
    ) -> Result<QueryDescriptor> {
        match (self, embedding) {
            (Strategy::Keyword, _) => Ok(builder.keyword(terms, page)),
            (Strategy::Vector, Some(embedding)) => Ok(builder.vector(embedding, terms, page)),
            (Strategy::Hybrid, Some(embedding)) => Ok(builder.hybrid(embedding, terms, page)),
            (_, None) => Err(SearchServiceError::Unavailable("embedding service")),
        }
    }
}

fn hit_to_result(hit: EngineHit, source: SearchType) -> SearchResult {
    SearchResult::new(hit.id, hit.title, hit.abstract_text, hit.score, source)
        .with_keywords(hit.keywords)
}

/// Executes strategies against the engine.
#[derive(Clone)]
pub struct RetrievalDispatcher {
    engine: Capability<dyn SearchEngine>,
    embedder: Capability<dyn EmbeddingProvider>,
    reranker: Capability<dyn RerankService>,
    relevance: RelevanceGate,
    builder: QueryBuilder,
    supplement_target: usize,
    supplement_min_score: f64,
}

impl RetrievalDispatcher {
    pub fn new(
        engine: Capability<dyn SearchEngine>,
        embedder: Capability<dyn EmbeddingProvider>,
        reranker: Capability<dyn RerankService>,
        relevance: RelevanceGate,
        tuning: &SearchTuning,
    ) -> Self {
        Self {
            engine,
            embedder,
            reranker,
            relevance,
            builder: QueryBuilder::from_tuning(tuning),
            supplement_target: tuning.supplement_target,
            supplement_min_score: tuning.supplement_min_score,
        }
    }

    pub fn engine(&self) -> &Capability<dyn SearchEngine> {
        &self.engine
    }

    pub fn embedder(&self) -> &Capability<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn reranker(&self) -> &Capability<dyn RerankService> {
        &self.reranker
    }

    pub fn relevance(&self) -> &RelevanceGate {
        &self.relevance
    }

    async fn embed(&self, embedder: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
        let metrics = get_metrics();
        let _timer = Metrics::start_timer(&metrics.embedding_duration_seconds);
        embedder.embed_one(text).await
    }

    async fn execute(
        &self,
        engine: &dyn SearchEngine,
        descriptor: &QueryDescriptor,
    ) -> Result<EngineResponse> {
        let metrics = get_metrics();
        let _timer = Metrics::start_timer(&metrics.engine_duration_seconds);
        engine.execute(descriptor).await
    }

    /// Run `request` with the already-decoded `query` and its expanded `terms`.
    ///
    /// Any collaborator failure other than rerank and relevance aborts the whole
    /// request.
    pub async fn dispatch(
        &self,
        query: &str,
        terms: &[String],
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let engine = self
            .engine
            .get()
            .ok_or(SearchServiceError::Unavailable("search engine"))?;
        let strategy = Strategy::from(request.search_type);
        let page = Pagination::new(request.page, request.page_size);

        let embedding = if strategy.requires_embedder() {
            let embedder = self
                .embedder
                .get()
                .ok_or(SearchServiceError::Unavailable("embedding service"))?;
            Some(self.embed(embedder.as_ref(), query).await?)
        } else {
            None
        };

        let descriptor = strategy.descriptor(&self.builder, embedding.as_deref(), terms, page)?;
        let response = self.execute(engine.as_ref(), &descriptor).await?;
        let engine_total = response.total;

        let source = strategy.source();
        let mut results: Vec<SearchResult> = response
            .hits
            .into_iter()
            .map(|hit| {
                let matched = strategy
                    .annotates_matches()
                    .then(|| matched_keywords(terms, &hit));
                let mut result = hit_to_result(hit, source);
                result.matched_keywords = matched;
                result
            })
            .collect();
        debug!(strategy = %source, hits = results.len(), engine_total, "Main query returned");

        if strategy.gates_relevance() {
            results = self
                .relevance
                .filter(query, results, request.enable_llm)
                .await;
        }

        if strategy.supplements() && results.len() < self.supplement_target {
            if let Some(embedder) = self.embedder.get() {
                results = self
                    .supplement(
                        engine.as_ref(),
                        embedder.as_ref(),
                        query,
                        terms,
                        results,
                        request.enable_llm,
                    )
                    .await?;
            }
        }

        if strategy.reranks() {
            if let Some(reranker) = self.reranker.get() {
                results = rerank_results(reranker.as_ref(), query, results).await;
            }
        }

        let mut results = fuse(results);
        if strategy.truncates_to_page() {
            results.truncate(request.page_size as usize);
        }

        let total = match strategy.total_semantics() {
            TotalSemantics::EngineReported => engine_total,
            TotalSemantics::LocalCount => results.len() as u64,
        };

        Ok(SearchResponse {
            total,
            results,
            search_type: request.search_type,
            rewritten_terms: Some(terms.to_vec()),
            search_id: None,
        })
    }

    /// Top up keyword results with vector candidates that neither share an id
    /// with them nor lexically match any term.
    async fn supplement(
        &self,
        engine: &dyn SearchEngine,
        embedder: &dyn EmbeddingProvider,
        query: &str,
        terms: &[String],
        mut results: Vec<SearchResult>,
        enable_llm: bool,
    ) -> Result<Vec<SearchResult>> {
        let remaining = self.supplement_target - results.len();
        info!(
            current = results.len(),
            remaining, "Keyword results below target, supplementing with vector search"
        );

        let combined = std::iter::once(query)
            .chain(terms.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let embedding = self.embed(embedder, &combined).await?;

        let seen_ids: Vec<String> = results.iter().map(|r| r.id.clone()).collect();
        let descriptor = self
            .builder
            .supplement(&embedding, terms, &seen_ids, remaining as u64);
        let response = self.execute(engine, &descriptor).await?;

        let seen: HashSet<&str> = seen_ids.iter().map(String::as_str).collect();
        let candidates: Vec<SearchResult> = response
            .hits
            .into_iter()
            .filter(|hit| !seen.contains(hit.id.as_str()) && hit.score >= self.supplement_min_score)
            .map(|hit| hit_to_result(hit, SearchType::Vector))
            .collect();

        let kept = self.relevance.filter(query, candidates, enable_llm).await;
        get_metrics()
            .supplemented_results_total
            .inc_by(kept.len() as u64);
        info!(added = kept.len(), "Vector supplementation complete");

        results.extend(kept);
        sort_by_score(&mut results);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_profiles() {
        let keyword = Strategy::from(SearchType::Keyword);
        assert!(!keyword.requires_embedder());
        assert!(keyword.supplements());
        assert!(keyword.reranks());
        assert!(!keyword.gates_relevance());
        assert_eq!(keyword.total_semantics(), TotalSemantics::LocalCount);

        let vector = Strategy::from(SearchType::Vector);
        assert!(vector.requires_embedder());
        assert!(vector.gates_relevance());
        assert!(!vector.reranks());
        assert!(!vector.annotates_matches());

        let hybrid = Strategy::from(SearchType::Hybrid);
        assert!(hybrid.requires_embedder());
        assert!(hybrid.annotates_matches());
        assert!(hybrid.truncates_to_page());
        assert_eq!(hybrid.total_semantics(), TotalSemantics::EngineReported);
    }

    #[test]
    fn test_descriptor_requires_embedding() {
        let builder = QueryBuilder::default();
        let terms = vec!["x".to_string()];
        let page = Pagination::new(1, 10);
        assert!(Strategy::Keyword.descriptor(&builder, None, &terms, page).is_ok());
        assert!(Strategy::Vector.descriptor(&builder, None, &terms, page).is_err());
        assert!(Strategy::Hybrid
            .descriptor(&builder, Some(&[0.1f32][..]), &terms, page)
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_engine_is_unavailable() {
        let dispatcher = RetrievalDispatcher::new(
            Capability::Absent,
            Capability::Absent,
            Capability::Absent,
            RelevanceGate::pass_through(),
            &SearchTuning::default(),
        );
        let err = dispatcher
            .dispatch("q", &["q".to_string()], &SearchRequest::new("q"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchServiceError::Unavailable("search engine")));
    }
}

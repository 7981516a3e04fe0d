//! Test doubles shared by the integration tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use litsearch::cache::{CacheStats, SearchCache, StoredSearch};
use litsearch::error::{CacheError, EngineError, Result};
use litsearch::search::{QueryExpander, RelevanceEvaluator, RelevanceVerdict, RerankScore};
use litsearch::{
    EmbeddingProvider, EngineHit, EngineResponse, QueryDescriptor, RerankService, SearchEngine,
};

pub fn hit(id: &str, title: &str, score: f64) -> EngineHit {
    EngineHit {
        id: id.to_string(),
        title: title.to_string(),
        score,
        ..Default::default()
    }
}

pub fn response(hits: Vec<EngineHit>, total: u64) -> EngineResponse {
    EngineResponse { hits, total }
}

/// Replays canned responses in call order and records every descriptor.
#[derive(Default)]
pub struct ScriptedEngine {
    responses: Mutex<VecDeque<EngineResponse>>,
    calls: Mutex<Vec<QueryDescriptor>>,
}

impl ScriptedEngine {
    pub fn new(responses: Vec<EngineResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<QueryDescriptor> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SearchEngine for ScriptedEngine {
    async fn execute(&self, descriptor: &QueryDescriptor) -> Result<EngineResponse> {
        self.calls.lock().push(descriptor.clone());
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct FailingEngine;

#[async_trait]
impl SearchEngine for FailingEngine {
    async fn execute(&self, _descriptor: &QueryDescriptor) -> Result<EngineResponse> {
        Err(EngineError::Status {
            status: 503,
            body: "cluster unavailable".to_string(),
        }
        .into())
    }

    async fn ping(&self) -> Result<()> {
        Err(EngineError::Request("connection refused".to_string()).into())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Returns a constant vector and records the texts it was asked to embed.
#[derive(Default)]
pub struct FixedEmbedder {
    texts: Mutex<Vec<String>>,
}

impl FixedEmbedder {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.texts.lock().extend(texts.iter().cloned());
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

/// Scores passages by position from a fixed list.
pub struct FixedReranker(pub Vec<f64>);

#[async_trait]
impl RerankService for FixedReranker {
    async fn rerank(&self, _query: &str, passages: &[String]) -> Result<Vec<RerankScore>> {
        Ok(self
            .0
            .iter()
            .take(passages.len())
            .enumerate()
            .map(|(index, &score)| RerankScore { index, score })
            .collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Relevant when the candidate text mentions the marker word.
pub struct MarkerJudge(pub &'static str);

#[async_trait]
impl RelevanceEvaluator for MarkerJudge {
    async fn judge(&self, _query: &str, text: &str) -> Result<RelevanceVerdict> {
        let relevant = text.to_lowercase().contains(self.0);
        Ok(RelevanceVerdict {
            is_relevant: relevant,
            reason: if relevant { "on topic" } else { "off topic" }.to_string(),
        })
    }

    fn name(&self) -> &str {
        "marker"
    }
}

/// Expands every query into a fixed term list.
pub struct FixedExpander(pub Vec<&'static str>);

#[async_trait]
impl QueryExpander for FixedExpander {
    async fn expand(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.0.iter().map(|t| t.to_string()).collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct FailingCache;

#[async_trait]
impl SearchCache for FailingCache {
    async fn save(&self, _record: StoredSearch) -> Result<String> {
        Err(CacheError::S3("bucket unreachable".to_string()).into())
    }

    async fn load(&self, _search_id: &str) -> Result<Option<StoredSearch>> {
        Err(CacheError::S3("bucket unreachable".to_string()).into())
    }

    async fn delete(&self, _search_id: &str) -> Result<bool> {
        Err(CacheError::S3("bucket unreachable".to_string()).into())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Err(CacheError::S3("bucket unreachable".to_string()).into())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

//! Cross-encoder reranking.
//!
//! The service scores `(query, title)` pairs. [`apply_rerank`] overwrites each
//! result's score with the score at its position and re-sorts. A failed call
//! or an empty score list leaves the results untouched.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RerankConfig;
use crate::error::{RerankError, Result};
use crate::metrics::{get_metrics, Metrics};
use crate::models::SearchResult;

use super::fusion::sort_by_score;

/// One score from the rerank service, aligned to an input position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    pub score: f64,
}

/// Trait for second-stage relevance scoring services.
#[async_trait]
pub trait RerankService: Send + Sync {
    /// Score each passage against the query.
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankScore>>;

    /// Get the name of this reranker.
    fn name(&self) -> &str;
}

/// Cross-encoder reranker served over HTTP.
///
/// Request: `{"text_1": query, "text_2": [...], "model": ...}`.
/// Response: `{"data": [{"index": i, "score": s}]}`, `index` optional.
pub struct CrossEncoderReranker {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl CrossEncoderReranker {
    pub fn from_config(config: &RerankConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(RerankError::Api("no rerank endpoint configured".to_string()).into());
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RerankError::Api(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct CrossEncoderRequest<'a> {
    text_1: &'a str,
    text_2: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct CrossEncoderResponse {
    #[serde(default)]
    data: Vec<CrossEncoderScore>,
}

#[derive(Deserialize)]
struct CrossEncoderScore {
    #[serde(default)]
    index: Option<usize>,
    score: f64,
}

fn align_scores(data: Vec<CrossEncoderScore>) -> Vec<RerankScore> {
    data.into_iter()
        .enumerate()
        .map(|(position, s)| RerankScore {
            index: s.index.unwrap_or(position),
            score: s.score,
        })
        .collect()
}

#[async_trait]
impl RerankService for CrossEncoderReranker {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankScore>> {
        let request = CrossEncoderRequest {
            text_1: query,
            text_2: passages,
            model: &self.model,
        };

        let mut req_builder = self.client.post(&self.api_url).json(&request);
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| RerankError::Api(format!("Cross-encoder API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(RerankError::Api(format!(
                "Cross-encoder API returned status: {}",
                response.status()
            ))
            .into());
        }

        let scores: CrossEncoderResponse = response
            .json()
            .await
            .map_err(|e| RerankError::MalformedResponse(e.to_string()))?;

        Ok(align_scores(scores.data))
    }

    fn name(&self) -> &str {
        "cross_encoder"
    }
}

/// Overwrite scores by position and sort descending (stable).
///
/// Scores whose index is out of range are ignored. Empty `scores` is a no-op.
pub fn apply_rerank(mut results: Vec<SearchResult>, scores: &[RerankScore]) -> Vec<SearchResult> {
    if scores.is_empty() {
        return results;
    }
    for score in scores {
        if let Some(result) = results.get_mut(score.index) {
            result.score = score.score;
        }
    }
    sort_by_score(&mut results);
    results
}

/// Rerank `results` by title. Failures leave the list as it was.
pub async fn rerank_results(
    service: &dyn RerankService,
    query: &str,
    results: Vec<SearchResult>,
) -> Vec<SearchResult> {
    if results.is_empty() {
        return results;
    }

    let metrics = get_metrics();
    let _timer = Metrics::start_timer(&metrics.rerank_duration_seconds);
    let titles: Vec<String> = results.iter().map(|r| r.title.clone()).collect();

    match service.rerank(query, &titles).await {
        Ok(scores) if scores.is_empty() => {
            debug!(reranker = service.name(), "Reranker returned no scores");
            results
        }
        Ok(scores) => {
            let reranked = apply_rerank(results, &scores);
            debug!(
                reranker = service.name(),
                top_scores = ?reranked.iter().take(3).map(|r| r.score).collect::<Vec<_>>(),
                "Rerank complete"
            );
            reranked
        }
        Err(e) => {
            warn!(reranker = service.name(), error = %e, "Rerank failed, keeping engine order");
            results
        }
    }
}

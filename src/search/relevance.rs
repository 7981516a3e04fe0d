//! LLM relevance gate for vector-sourced candidates.
//!
//! The gate is a pass-through unless the caller enables it and an evaluator is
//! present. Evaluation failures keep the candidate (fail-open) and record the
//! failure as the reason.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::capability::Capability;
use crate::error::{RelevanceError, Result};
use crate::llm::{extract_json_block, ChatClient};
use crate::metrics::{get_metrics, Metrics};
use crate::models::SearchResult;

/// Reason recorded when the caller did not enable the gate.
pub const NOT_EVALUATED: &str = "not evaluated";

/// Reason recorded when no LLM credential is configured.
pub const NO_CREDENTIAL: &str = "no LLM credential configured";

const SYSTEM_PROMPT: &str =
    "You are an expert in judging the relevance of medical literature. Follow the requested output format strictly.";

/// Outcome of one relevance judgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
    pub reason: String,
}

impl RelevanceVerdict {
    pub fn relevant(reason: impl Into<String>) -> Self {
        Self {
            is_relevant: true,
            reason: reason.into(),
        }
    }
}

/// Judges whether a candidate text is about the query topic.
#[async_trait]
pub trait RelevanceEvaluator: Send + Sync {
    async fn judge(&self, query: &str, text: &str) -> Result<RelevanceVerdict>;

    fn name(&self) -> &str;
}

/// Relevance evaluator backed by an OpenAI-compatible chat model.
pub struct LlmRelevanceEvaluator {
    client: Arc<ChatClient>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmRelevanceEvaluator {
    pub fn new(client: Arc<ChatClient>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client,
            temperature,
            max_tokens,
        }
    }

    fn prompt(query: &str, text: &str) -> String {
        format!(
            "You screen medical literature. Given a medical topic and a document, decide whether \
             the document is related to the topic:\n\
             - If the document mainly discusses the topic, answer true with a short reason.\n\
             - If the document mentions the topic indirectly (background, comparison, secondary \
             content), answer true with a short reason.\n\
             - If the document is unrelated to the topic, answer false with a short reason.\n\n\
             Topic: {query}\n\
             Document:\n{text}\n\n\
             Always answer with JSON wrapped in <json></json> tags:\n\
             {{\"is_relevant\": true or false, \"reason\": \"...\"}}"
        )
    }
}

#[async_trait]
impl RelevanceEvaluator for LlmRelevanceEvaluator {
    async fn judge(&self, query: &str, text: &str) -> Result<RelevanceVerdict> {
        let reply = self
            .client
            .complete(
                SYSTEM_PROMPT,
                &Self::prompt(query, text),
                self.temperature,
                self.max_tokens,
            )
            .await
            .map_err(RelevanceError::from)?;
        Ok(parse_verdict(&reply)?)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[derive(Deserialize)]
struct VerdictPayload {
    #[serde(default)]
    is_relevant: Option<serde_json::Value>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse `{"is_relevant": .., "reason": ..}` out of an LLM reply.
///
/// A missing `is_relevant` counts as relevant.
pub fn parse_verdict(reply: &str) -> std::result::Result<RelevanceVerdict, RelevanceError> {
    let json = extract_json_block(reply)
        .ok_or_else(|| RelevanceError::MalformedVerdict(format!("no JSON block in: {}", reply)))?;
    let payload: VerdictPayload = serde_json::from_str(json)
        .map_err(|e| RelevanceError::MalformedVerdict(format!("{}: {}", e, json)))?;

    let is_relevant = match payload.is_relevant {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
        Some(serde_json::Value::Null) | None => true,
        Some(other) => return Err(RelevanceError::MalformedVerdict(other.to_string())),
    };

    Ok(RelevanceVerdict {
        is_relevant,
        reason: payload.reason.unwrap_or_else(|| "no reason given".to_string()),
    })
}

/// Text shown to the evaluator for one candidate.
pub fn candidate_text(result: &SearchResult) -> String {
    format!("Title: {}\nAbstract: {}", result.title, result.abstract_text)
}

/// Optional LLM filter over candidate lists.
#[derive(Clone)]
pub struct RelevanceGate {
    evaluator: Capability<dyn RelevanceEvaluator>,
    concurrency: usize,
}

impl RelevanceGate {
    pub fn new(evaluator: Capability<dyn RelevanceEvaluator>, concurrency: usize) -> Self {
        Self {
            evaluator,
            concurrency: concurrency.max(1),
        }
    }

    /// A gate with no evaluator; every candidate passes.
    pub fn pass_through() -> Self {
        Self::new(Capability::Absent, 1)
    }

    pub fn is_available(&self) -> bool {
        self.evaluator.is_present()
    }

    /// Judge one candidate. Never fails.
    pub async fn evaluate(&self, query: &str, text: &str, enabled: bool) -> RelevanceVerdict {
        if !enabled {
            return RelevanceVerdict::relevant(NOT_EVALUATED);
        }
        let Some(evaluator) = self.evaluator.get() else {
            return RelevanceVerdict::relevant(NO_CREDENTIAL);
        };

        match evaluator.judge(query, text).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "Relevance evaluation failed, keeping candidate");
                RelevanceVerdict::relevant(format!("evaluation failed: {}", e))
            }
        }
    }

    /// Judge every candidate, set its `relevance_reason` and keep the relevant
    /// ones in their original order.
    pub async fn filter(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        enabled: bool,
    ) -> Vec<SearchResult> {
        if candidates.is_empty() {
            return candidates;
        }

        let metrics = get_metrics();
        let _timer = Metrics::start_timer(&metrics.relevance_duration_seconds);

        let judged: Vec<(SearchResult, RelevanceVerdict)> = stream::iter(candidates)
            .map(|candidate| async move {
                let verdict = self
                    .evaluate(query, &candidate_text(&candidate), enabled)
                    .await;
                (candidate, verdict)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let total = judged.len();
        let kept: Vec<SearchResult> = judged
            .into_iter()
            .filter_map(|(mut candidate, verdict)| {
                if verdict.is_relevant {
                    candidate.relevance_reason = Some(verdict.reason);
                    Some(candidate)
                } else {
                    metrics.relevance_rejections_total.inc();
                    info!(
                        id = %candidate.id,
                        reason = %verdict.reason,
                        "Candidate judged not relevant"
                    );
                    None
                }
            })
            .collect();

        debug!(total, kept = kept.len(), "Relevance gate complete");
        kept
    }
}

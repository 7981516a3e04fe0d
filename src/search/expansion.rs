//! Query expansion into equivalent medical terms.
//!
//! The LLM expander asks for the query's primary entity plus multilingual
//! equivalents (Chinese term, English name, abbreviation) and flattens them
//! into an ordered, deduplicated term list.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ExpansionError, Result};
use crate::llm::{extract_json_block, ChatClient};
use crate::metrics::{get_metrics, Metrics};

const SYSTEM_PROMPT: &str = "You are a medical terminology standardisation expert. Return JSON \
                             exactly as requested, wrapped in <json></json> tags.";

/// Trait for query expansion implementations.
#[async_trait]
pub trait QueryExpander: Send + Sync {
    /// Expand a query into search terms. The first term names the query's
    /// primary entity or is the query itself.
    async fn expand(&self, query: &str) -> Result<Vec<String>>;

    /// Get the name of this expander.
    fn name(&self) -> &str;
}

/// Expander that returns the query unchanged.
pub struct PassthroughExpander;

#[async_trait]
impl QueryExpander for PassthroughExpander {
    async fn expand(&self, query: &str) -> Result<Vec<String>> {
        Ok(vec![query.to_string()])
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Expander backed by an OpenAI-compatible chat model.
pub struct LlmQueryExpander {
    client: Arc<ChatClient>,
    temperature: f32,
    max_tokens: u32,
    min_query_chars: usize,
}

impl LlmQueryExpander {
    pub fn new(
        client: Arc<ChatClient>,
        temperature: f32,
        max_tokens: u32,
        min_query_chars: usize,
    ) -> Self {
        Self {
            client,
            temperature,
            max_tokens,
            min_query_chars,
        }
    }

    fn prompt(query: &str) -> String {
        format!(
            "Analyse the medical query below.\n\
             1. Extract the core disease or condition as \"entity\", using the most \
             representative standard medical term.\n\
             2. Provide 10 distinct equivalent terms for that entity. Each item has \"zh\" \
             (simplified Chinese term without brackets), \"en\" (full English name) and \"abbr\" \
             (common English abbreviation). Optional fields: \"category\", \"icd\".\n\
             3. Every term must denote exactly the same medical concept. Never include similar \
             but different diseases.\n\n\
             Answer inside <json></json> tags with this shape:\n\
             {{\"qid\": \"{query}\", \"entity\": \"...\", \"additional_info\": \
             [{{\"zh\": \"...\", \"en\": \"...\", \"abbr\": \"...\"}}]}}\n\n\
             Query: {query}"
        )
    }
}

#[async_trait]
impl QueryExpander for LlmQueryExpander {
    async fn expand(&self, query: &str) -> Result<Vec<String>> {
        if query.trim().chars().count() < self.min_query_chars {
            debug!(query, "Query too short, skipping rewrite");
            return Ok(vec![query.to_string()]);
        }

        let reply = self
            .client
            .complete(
                SYSTEM_PROMPT,
                &Self::prompt(query),
                self.temperature,
                self.max_tokens,
            )
            .await
            .map_err(ExpansionError::from)?;

        let terms = extract_terms(&reply)
            .ok_or_else(|| ExpansionError::NoTerms(reply.clone()))?;
        info!(query, ?terms, "Query rewritten");
        Ok(terms)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// A bare `{...}` object in a reply without tags.
fn bare_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn push_term(terms: &mut Vec<String>, value: Option<&Value>) {
    if let Some(term) = value.and_then(Value::as_str).map(str::trim) {
        if !term.is_empty() && !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
}

/// Flatten a rewrite reply into terms: `qid`, `entity`, then each
/// `additional_info` item's `zh`, `en`, `abbr` (or the item itself when it is a
/// string). Returns `None` when the reply holds no usable terms.
pub fn extract_terms(reply: &str) -> Option<Vec<String>> {
    let json = extract_json_block(reply).or_else(|| bare_object(reply))?;
    let data: Value = serde_json::from_str(json).ok()?;

    let mut terms = Vec::new();
    push_term(&mut terms, data.get("qid"));
    push_term(&mut terms, data.get("entity"));

    if let Some(items) = data.get("additional_info").and_then(Value::as_array) {
        for item in items {
            match item {
                Value::Object(_) => {
                    for key in ["zh", "en", "abbr"] {
                        push_term(&mut terms, item.get(key));
                    }
                }
                Value::String(_) => push_term(&mut terms, Some(item)),
                _ => {}
            }
        }
    }

    (!terms.is_empty()).then_some(terms)
}

/// Expand `query`, falling back to `[query]` on failure or an empty result.
pub async fn expand_or_original(expander: &dyn QueryExpander, query: &str) -> Vec<String> {
    let metrics = get_metrics();
    let _timer = Metrics::start_timer(&metrics.expansion_duration_seconds);

    match expander.expand(query).await {
        Ok(terms) if !terms.is_empty() => terms,
        Ok(_) => vec![query.to_string()],
        Err(e) => {
            warn!(expander = expander.name(), error = %e, "Query expansion failed, using original query");
            vec![query.to_string()]
        }
    }
}

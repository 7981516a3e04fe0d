//! OpenSearch `_search` client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::search::QueryDescriptor;

use super::{EngineHit, EngineResponse, SearchEngine};

/// Search engine backed by an OpenSearch cluster over HTTP(S).
pub struct OpenSearchEngine {
    client: Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id", default)]
    doc_id: Option<String>,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: RawSource,
    #[serde(default)]
    highlight: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSource {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    keywords: Option<Keywords>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Keywords {
    List(Vec<String>),
    Single(String),
}

impl OpenSearchEngine {
    /// Create a client from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(EngineError::Request("no engine host configured".to_string()).into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| EngineError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }
}

/// Normalize a raw `_search` body into hits and a total.
fn parse_search_body(body: SearchBody) -> EngineResponse {
    let hits: Vec<EngineHit> = body
        .hits
        .hits
        .into_iter()
        .map(|hit| {
            let id = match hit.source.id {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Null) | None => hit.doc_id.unwrap_or_default(),
                Some(other) => other.to_string(),
            };
            let keywords = match hit.source.keywords {
                Some(Keywords::List(list)) => list,
                Some(Keywords::Single(s)) if !s.is_empty() => vec![s],
                _ => Vec::new(),
            };
            EngineHit {
                id,
                title: hit.source.title.unwrap_or_default(),
                abstract_text: hit.source.abstract_text.unwrap_or_default(),
                keywords,
                score: hit.score.unwrap_or(0.0),
                highlight: hit.highlight,
            }
        })
        .collect();

    let total = match body.hits.total {
        Some(TotalHits::Object { value }) | Some(TotalHits::Count(value)) => value,
        None => hits.len() as u64,
    };

    EngineResponse { hits, total }
}

#[async_trait]
impl SearchEngine for OpenSearchEngine {
    async fn execute(&self, descriptor: &QueryDescriptor) -> Result<EngineResponse> {
        let mut builder = self.client.post(self.search_url()).json(&descriptor.body);
        if let Some(pipeline) = &descriptor.search_pipeline {
            builder = builder.query(&[("search_pipeline", pipeline.as_str())]);
        }

        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: SearchBody = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;
        let parsed = parse_search_body(body);
        debug!(
            strategy = %descriptor.strategy,
            hits = parsed.hits.len(),
            total = parsed.total,
            "Engine query complete"
        );
        Ok(parsed)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(EngineError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }
            .into())
        }
    }

    fn name(&self) -> &str {
        "opensearch"
    }
}

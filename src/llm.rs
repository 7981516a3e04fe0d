//! Minimal OpenAI-compatible chat completion client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};

/// Chat completion client shared by the relevance gate and the query expander.
pub struct ChatClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    /// Create a client, or `None` when no credential is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        }))
    }

    /// Send one system + user exchange and return the trimmed reply.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> std::result::Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("status {}: {}", status, body)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("Failed to parse response: {}", e)))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyReply)
    }
}

/// Extract the first JSON payload from an LLM reply.
///
/// Looks for `<json>...</json>` first, then a fenced ```json block.
pub fn extract_json_block(reply: &str) -> Option<&str> {
    if let Some(start) = reply.find("<json>") {
        let rest = &reply[start + "<json>".len()..];
        if let Some(end) = rest.find("</json>") {
            return Some(rest[..end].trim());
        }
    }
    if let Some(start) = reply.find("```json") {
        let rest = &reply[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_credential_means_no_client() {
        let config = LlmConfig::default();
        assert!(ChatClient::from_config(&config).unwrap().is_none());

        let config = LlmConfig {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(ChatClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_client_url() {
        let config = LlmConfig {
            api_key: Some("sk".to_string()),
            base_url: "http://llm.local/v1/".to_string(),
            ..Default::default()
        };
        let client = ChatClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.url, "http://llm.local/v1/chat/completions");
    }

    #[test]
    fn test_extract_json_block() {
        assert_eq!(
            extract_json_block("ok <json> {\"a\": 1} </json> done"),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            extract_json_block("```json\n{\"a\": 2}\n```"),
            Some("{\"a\": 2}")
        );
        assert_eq!(extract_json_block("{\"a\": 3}"), None);
        assert_eq!(extract_json_block("<json>{\"a\": 4}"), None);
    }
}

//! Error types for the literature search service.

use thiserror::Error;

/// Main error type for search service operations.
#[derive(Error, Debug)]
pub enum SearchServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Rerank error: {0}")]
    Rerank(#[from] RerankError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Relevance evaluation error: {0}")]
    Relevance(#[from] RelevanceError),

    #[error("Query expansion error: {0}")]
    Expansion(#[from] ExpansionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} is not available")]
    Unavailable(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors talking to the full-text/vector search engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    MalformedResponse(String),
}

/// Embedding-related errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Cross-encoder rerank errors.
#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Rerank API error: {0}")]
    Api(String),

    #[error("Unexpected rerank response: {0}")]
    MalformedResponse(String),
}

/// OpenAI-compatible chat completion errors.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM returned no content")]
    EmptyReply,
}

/// LLM relevance gate errors.
#[derive(Error, Debug)]
pub enum RelevanceError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Could not parse LLM verdict: {0}")]
    MalformedVerdict(String),
}

/// Query expansion errors.
#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("No terms in rewrite: {0}")]
    NoTerms(String),
}

/// Result cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("S3 error: {0}")]
    S3(String),

    #[error("Corrupt cache entry {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result type alias for search service operations.
pub type Result<T> = std::result::Result<T, SearchServiceError>;

//! Configuration settings for the literature search service.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub embedding: EmbeddingConfig,
    pub rerank: RerankConfig,
    pub llm: LlmConfig,
    pub expansion: ExpansionConfig,
    pub cache: CacheConfig,
    pub search: SearchTuning,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("litsearch.toml"),
            dirs::config_dir()
                .map(|p| p.join("litsearch/config.toml"))
                .unwrap_or_default(),
        ];

        let mut config = None;
        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                config = Some(Self::from_file(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            tracing::info!("No config file found, using defaults");
            Config::default()
        });
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables.
    ///
    /// The lookup is injected so tests do not have to touch the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v.eq_ignore_ascii_case("true"));

        if let Some(host) = lookup("OPENSEARCH_HOST") {
            self.engine.host = host;
        }
        if let Some(port) = lookup("OPENSEARCH_PORT").and_then(|p| p.parse().ok()) {
            self.engine.port = port;
        }
        if let Some(username) = lookup("OPENSEARCH_USERNAME") {
            self.engine.username = Some(username);
        }
        if let Some(password) = lookup("OPENSEARCH_PASSWORD") {
            self.engine.password = Some(password);
        }
        if let Some(index) = lookup("OPENSEARCH_INDEX_NAME") {
            self.engine.index = index;
        }
        if let Some(endpoint) = lookup("EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("RERANK_ENDPOINT") {
            self.rerank.endpoint = endpoint;
        }
        if let Some(enabled) = flag("ENABLE_RERANK") {
            self.rerank.enabled = enabled;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.llm.base_url = base;
        }
        if let Some(workers) = lookup("LLM_MAX_WORKERS").and_then(|w| w.parse().ok()) {
            self.llm.max_concurrency = workers;
        }
        if let Some(false) = flag("ENABLE_CACHE") {
            self.cache.backend = CacheBackendType::None;
        }
        if let Some(use_s3) = flag("USE_S3_CACHE") {
            if self.cache.backend != CacheBackendType::None {
                self.cache.backend = if use_s3 {
                    CacheBackendType::S3
                } else {
                    CacheBackendType::Memory
                };
            }
        }
        if let Some(bucket) = lookup("S3_BUCKET") {
            self.cache.s3.bucket = bucket;
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.cache.s3.region = Some(region);
        }
        if let Some(environment) = lookup("ENVIRONMENT") {
            self.server.environment = environment;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.engine.host.is_empty() && self.engine.index.is_empty() {
            return Err(ConfigError::MissingField("engine.index".to_string()).into());
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid("embedding.batch_size must be > 0".to_string()).into());
        }

        if self.search.supplement_target == 0 {
            return Err(
                ConfigError::Invalid("search.supplement_target must be > 0".to_string()).into(),
            );
        }

        if self.cache.backend == CacheBackendType::S3 && self.cache.s3.bucket.is_empty() {
            return Err(ConfigError::MissingField("cache.s3.bucket".to_string()).into());
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins ("*" allows any)
    pub cors_origins: Vec<String>,
    /// Deployment environment name
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
        }
    }
}

/// OpenSearch cluster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cluster host; empty disables the engine
    pub host: String,
    pub port: u16,
    /// Use https
    pub use_tls: bool,
    /// Verify TLS certificates
    pub verify_certs: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Index holding the literature documents
    pub index: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 443,
            use_tls: true,
            verify_certs: false,
            username: None,
            password: None,
            index: String::new(),
            timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Base URL of the cluster.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding endpoint URL; empty disables the embedder
    pub endpoint: String,
    /// Model name sent with requests (optional)
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Texts per request
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Number of embeddings memoised in memory (0 disables)
    pub cache_entries: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: None,
            api_key: None,
            batch_size: 32,
            timeout_secs: 30,
            cache_entries: 1000,
        }
    }
}

/// Cross-encoder rerank configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    /// Rerank endpoint URL; empty disables reranking
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            model: "bge-reranker-v2-m3".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// OpenAI-compatible LLM configuration used by the relevance gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// API key; without one the relevance gate is a pass-through
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Candidates evaluated at once (1 = sequential)
    pub max_concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            api_key: None,
            model: "Qwen2.5-72B-Instruct-AWQ".to_string(),
            temperature: 0.01,
            max_tokens: 100,
            timeout_secs: 60,
            max_concurrency: 1,
        }
    }
}

/// Query expansion configuration. Uses the `llm` endpoint and credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Queries shorter than this (in chars) are not rewritten
    pub min_query_chars: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: 0.1,
            max_tokens: 1024,
            min_query_chars: 2,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// Maximum entries for the memory backend
    pub max_entries: u64,
    pub s3: S3CacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendType::Memory,
            ttl_secs: 30 * 24 * 60 * 60,
            max_entries: 10_000,
            s3: S3CacheConfig::default(),
        }
    }
}

/// Cache backend type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    None,
    Memory,
    S3,
}

/// S3 cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3CacheConfig {
    pub bucket: String,
    /// Key prefix for stored responses
    pub prefix: String,
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
}

impl Default for S3CacheConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: "search-results".to_string(),
            region: None,
            endpoint_url: None,
        }
    }
}

/// Retrieval tuning constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    /// Keyword result count below which vector supplementation runs
    pub supplement_target: usize,
    /// Supplement candidates scoring below this are discarded
    pub supplement_min_score: f64,
    /// Name of the engine-side score normalization pipeline for hybrid search
    pub hybrid_pipeline: String,
    /// Document field holding the embedding
    pub vector_field: String,
    pub boosts: FieldBoosts,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            supplement_target: 10_000,
            supplement_min_score: 0.1,
            hybrid_pipeline: "nlp-search-pipeline".to_string(),
            vector_field: "embedding".to_string(),
            boosts: FieldBoosts::default(),
        }
    }
}

/// Per-field phrase match boosts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBoosts {
    pub keywords: f32,
    pub title: f32,
    #[serde(rename = "abstract")]
    pub abstract_text: f32,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            keywords: 10.0,
            title: 5.0,
            abstract_text: 2.0,
        }
    }
}

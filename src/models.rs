//! Request and response types shared by the search pipeline, the cache and the REST API.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SearchServiceError};

/// Largest page size a single request may ask for.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Retrieval strategy requested by the caller, also recorded on each hit as its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Weighted phrase matching over title, keywords and abstract.
    #[default]
    Keyword,
    /// k-NN similarity over document embeddings.
    Vector,
    /// Keyword and k-NN sub-queries fused by the engine.
    Hybrid,
}

impl SearchType {
    /// Parse a strategy name. Anything unrecognised is treated as keyword search.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "vector" => SearchType::Vector,
            "hybrid" => SearchType::Hybrid,
            _ => SearchType::Keyword,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Keyword => "keyword",
            SearchType::Vector => "vector",
            SearchType::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lenient_search_type<'de, D>(deserializer: D) -> std::result::Result<SearchType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| SearchType::parse_lenient(&s))
        .unwrap_or_default())
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    30
}

/// An incoming search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text query, possibly percent-encoded.
    pub query: String,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Results per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Retrieval strategy.
    #[serde(default, deserialize_with = "lenient_search_type")]
    pub search_type: SearchType,
    /// Run the LLM relevance gate on vector-sourced candidates.
    #[serde(default)]
    pub enable_llm: bool,
}

impl SearchRequest {
    /// Create a keyword request for the first page with default page size.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: default_page(),
            page_size: default_page_size(),
            search_type: SearchType::default(),
            enable_llm: false,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn enable_llm(mut self, enable: bool) -> Self {
        self.enable_llm = enable;
        self
    }

    /// Check the request bounds.
    pub fn validate(&self) -> Result<()> {
        if self.query.is_empty() {
            return Err(SearchServiceError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if self.page < 1 {
            return Err(SearchServiceError::InvalidRequest(
                "page must be >= 1".to_string(),
            ));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(SearchServiceError::InvalidRequest(format!(
                "pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

/// One ranked document in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Opaque document identifier.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Engine score, or rerank score once reranking ran.
    pub score: f64,
    /// Strategy that produced this hit.
    pub source: SearchType,
    /// Expanded terms found in the document, without duplicates.
    #[serde(default)]
    pub matched_keywords: Option<Vec<String>>,
    /// Reason reported by the relevance gate.
    #[serde(default)]
    pub relevance_reason: Option<String>,
}

impl SearchResult {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        score: f64,
        source: SearchType,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            keywords: Vec::new(),
            abstract_text: abstract_text.into(),
            score,
            source,
            matched_keywords: None,
            relevance_reason: None,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// The full answer to one search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Engine-reported total for hybrid search, local result count otherwise.
    pub total: u64,
    pub results: Vec<SearchResult>,
    #[serde(rename = "searchType")]
    pub search_type: SearchType,
    #[serde(rename = "rewrittenTerms", default)]
    pub rewritten_terms: Option<Vec<String>>,
    /// Cache handle, set after a successful cache write.
    #[serde(default)]
    pub search_id: Option<String>,
}

impl SearchResponse {
    /// The failure-shaped response: nothing found, no rewritten terms.
    pub fn empty(search_type: SearchType) -> Self {
        Self {
            total: 0,
            results: Vec::new(),
            search_type,
            rewritten_terms: None,
            search_id: None,
        }
    }
}

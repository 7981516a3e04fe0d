//! Full-text and vector search engine collaborators.
//!
//! The engine owns scoring. The pipeline only hands it a [`QueryDescriptor`]
//! and reads back normalized [`EngineHit`]s.

mod opensearch;

pub use opensearch::OpenSearchEngine;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::search::QueryDescriptor;

/// One document returned by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineHit {
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub score: f64,
    /// Highlighted fragments per field, with `<em>` markup.
    pub highlight: BTreeMap<String, Vec<String>>,
}

/// Hits for one query plus the engine's own total count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineResponse {
    pub hits: Vec<EngineHit>,
    pub total: u64,
}

/// A search engine that executes query descriptors.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute one query.
    async fn execute(&self, descriptor: &QueryDescriptor) -> Result<EngineResponse>;

    /// Check that the engine is reachable.
    async fn ping(&self) -> Result<()>;

    /// Engine name for logs and health output.
    fn name(&self) -> &str;
}

//! Search orchestration.
//!
//! ```text
//! raw query
//!     │ decode
//!     ▼
//! QueryExpander ──► terms
//!     │
//!     ▼
//! QueryBuilder ──► descriptor (keyword | vector | hybrid)
//!     │
//!     ▼
//! RetrievalDispatcher ──► engine hits ──► matched keywords
//!     │                                   relevance gate (vector)
//!     │                                   supplementation (keyword)
//!     ▼
//! Reranker (keyword, hybrid) ──► Fusion ──► response ──► cache
//! ```

mod dispatcher;
mod expansion;
mod fusion;
mod highlight;
mod orchestrator;
mod query_builder;
mod relevance;
mod reranker;

pub use dispatcher::{RetrievalDispatcher, Strategy, TotalSemantics};
pub use expansion::{
    expand_or_original, extract_terms, LlmQueryExpander, PassthroughExpander, QueryExpander,
};
pub use fusion::{fuse, sort_by_score};
pub use highlight::{highlighted_terms, matched_keywords, substring_matches};
pub use orchestrator::{decode_query, SearchOrchestrator, SearchOrchestratorBuilder};
pub use query_builder::{Pagination, QueryBuilder, QueryDescriptor};
pub use relevance::{
    candidate_text, parse_verdict, LlmRelevanceEvaluator, RelevanceEvaluator, RelevanceGate,
    RelevanceVerdict, NOT_EVALUATED, NO_CREDENTIAL,
};
pub use reranker::{apply_rerank, rerank_results, CrossEncoderReranker, RerankScore, RerankService};

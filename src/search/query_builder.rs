//! Engine query descriptors for the three retrieval strategies.
//!
//! Every builder here is a pure function of its inputs: the same terms,
//! vector and pagination always produce the same JSON body.

use serde_json::{json, Value};

use crate::config::{FieldBoosts, SearchTuning};
use crate::models::SearchType;

/// Document fields returned for every hit.
const SOURCE_FIELDS: [&str; 4] = ["id", "title", "abstract", "keywords"];

/// A query ready to send to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    /// Strategy the descriptor was built for.
    pub strategy: SearchType,
    /// `_search` request body.
    pub body: Value,
    /// Engine-side fusion pipeline, set for hybrid queries.
    pub search_pipeline: Option<String>,
}

/// Page window of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Offset of the first hit: `(page - 1) * page_size`.
    pub fn from(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn size(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// Builds engine query descriptors.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    vector_field: String,
    boosts: FieldBoosts,
    hybrid_pipeline: String,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::from_tuning(&SearchTuning::default())
    }
}

impl QueryBuilder {
    pub fn from_tuning(tuning: &SearchTuning) -> Self {
        Self {
            vector_field: tuning.vector_field.clone(),
            boosts: tuning.boosts,
            hybrid_pipeline: tuning.hybrid_pipeline.clone(),
        }
    }

    /// Weighted phrase clauses, three per term (title, keywords, abstract).
    fn should_clauses(&self, terms: &[String]) -> Vec<Value> {
        terms
            .iter()
            .flat_map(|term| {
                [
                    json!({"match_phrase": {"title": {"query": term, "boost": self.boosts.title}}}),
                    json!({"match_phrase": {"keywords": {"query": term, "boost": self.boosts.keywords}}}),
                    json!({"match_phrase": {"abstract": {"query": term, "boost": self.boosts.abstract_text}}}),
                ]
            })
            .collect()
    }

    /// Phrase matches that exclude any document lexically matching a term.
    fn exclusion_clauses(terms: &[String]) -> Vec<Value> {
        terms
            .iter()
            .flat_map(|term| {
                [
                    json!({"match_phrase": {"title": term}}),
                    json!({"match_phrase": {"keywords": term}}),
                    json!({"match_phrase": {"abstract": term}}),
                ]
            })
            .collect()
    }

    fn keyword_bool(&self, terms: &[String]) -> Value {
        json!({
            "bool": {
                "should": self.should_clauses(terms),
                "minimum_should_match": 1
            }
        })
    }

    fn knn(&self, embedding: &[f32], k: u64) -> Value {
        json!({
            "knn": {
                self.vector_field.as_str(): {
                    "vector": embedding,
                    "k": k
                }
            }
        })
    }

    fn highlight() -> Value {
        json!({
            "fields": {
                "title": {},
                "abstract": {},
                "keywords": {}
            }
        })
    }

    /// Disjunctive phrase query over title, keywords and abstract.
    pub fn keyword(&self, terms: &[String], page: Pagination) -> QueryDescriptor {
        QueryDescriptor {
            strategy: SearchType::Keyword,
            body: json!({
                "from": page.from(),
                "size": page.size(),
                "query": self.keyword_bool(terms),
                "_source": SOURCE_FIELDS,
                "highlight": Self::highlight()
            }),
            search_pipeline: None,
        }
    }

    /// k-NN query with `k = page_size`, excluding lexical matches of any term.
    pub fn vector(&self, embedding: &[f32], terms: &[String], page: Pagination) -> QueryDescriptor {
        QueryDescriptor {
            strategy: SearchType::Vector,
            body: json!({
                "from": page.from(),
                "size": page.size(),
                "query": {
                    "bool": {
                        "must": self.knn(embedding, page.size()),
                        "must_not": Self::exclusion_clauses(terms)
                    }
                },
                "_source": SOURCE_FIELDS
            }),
            search_pipeline: None,
        }
    }

    /// Keyword and k-NN sub-queries, fused by the engine's normalization pipeline.
    pub fn hybrid(&self, embedding: &[f32], terms: &[String], page: Pagination) -> QueryDescriptor {
        QueryDescriptor {
            strategy: SearchType::Hybrid,
            body: json!({
                "from": page.from(),
                "size": page.size(),
                "query": {
                    "hybrid": {
                        "queries": [
                            self.keyword_bool(terms),
                            self.knn(embedding, page.size())
                        ]
                    }
                },
                "_source": SOURCE_FIELDS,
                "highlight": Self::highlight()
            }),
            search_pipeline: Some(self.hybrid_pipeline.clone()),
        }
    }

    /// Vector query for `size` extra candidates that excludes the ids already
    /// returned and any document lexically matching a term.
    pub fn supplement(
        &self,
        embedding: &[f32],
        terms: &[String],
        exclude_ids: &[String],
        size: u64,
    ) -> QueryDescriptor {
        let mut must_not = vec![json!({"terms": {"id": exclude_ids}})];
        must_not.extend(Self::exclusion_clauses(terms));

        QueryDescriptor {
            strategy: SearchType::Vector,
            body: json!({
                "size": size,
                "query": {
                    "bool": {
                        "must": self.knn(embedding, size),
                        "must_not": must_not
                    }
                },
                "_source": SOURCE_FIELDS
            }),
            search_pipeline: None,
        }
    }
}

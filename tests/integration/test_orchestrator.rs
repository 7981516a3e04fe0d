//! End-to-end pipeline tests through `SearchOrchestrator::search`.

use std::sync::Arc;

use litsearch::cache::MemorySearchCache;
use litsearch::config::{CacheConfig, SearchTuning};
use litsearch::search::{NOT_EVALUATED, NO_CREDENTIAL};
use litsearch::{SearchOrchestrator, SearchRequest, SearchType};

use crate::common::{
    hit, response, FailingCache, FailingEngine, FixedEmbedder, FixedExpander, FixedReranker,
    MarkerJudge, ScriptedEngine,
};

fn ids(results: &[litsearch::SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn test_empty_query_returns_empty_without_engine_call() {
    let engine = ScriptedEngine::new(vec![response(vec![hit("d1", "x", 1.0)], 1)]);
    let orchestrator = SearchOrchestrator::builder().engine(engine.clone()).build();

    let result = orchestrator
        .search(&SearchRequest::new("").search_type(SearchType::Hybrid))
        .await;
    assert_eq!(result.total, 0);
    assert!(result.results.is_empty());
    assert_eq!(result.search_type, SearchType::Hybrid);
    assert!(result.search_id.is_none());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_whitespace_query_is_searched() {
    let engine = ScriptedEngine::new(vec![response(vec![hit("d1", "x", 1.0)], 1)]);
    let orchestrator = SearchOrchestrator::builder().engine(engine.clone()).build();

    let result = orchestrator.search(&SearchRequest::new("%20%20")).await;

    assert_eq!(engine.calls().len(), 1);
    assert_eq!(result.rewritten_terms, Some(vec!["  ".to_string()]));
    assert_eq!(ids(&result.results), vec!["d1"]);
}

#[tokio::test]
async fn test_keyword_query_has_three_clauses_per_term() {
    let engine = ScriptedEngine::new(vec![response(
        vec![hit("d1", "Glaucoma screening in adults", 3.0)],
        1,
    )]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine.clone())
        .expander(Arc::new(FixedExpander(vec!["glaucoma", "青光眼", "GLC"])))
        .build();

    let result = orchestrator.search(&SearchRequest::new("青光眼")).await;

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let should = calls[0].body["query"]["bool"]["should"].as_array().unwrap();
    assert_eq!(should.len(), 9);
    assert_eq!(calls[0].body["from"], 0);
    assert_eq!(calls[0].body["size"], 30);

    assert_eq!(
        result.rewritten_terms,
        Some(vec![
            "glaucoma".to_string(),
            "青光眼".to_string(),
            "GLC".to_string()
        ])
    );
    assert_eq!(result.results[0].source, SearchType::Keyword);
    assert_eq!(
        result.results[0].matched_keywords,
        Some(vec!["glaucoma".to_string()])
    );
}

#[tokio::test]
async fn test_keyword_total_is_local_count_and_sorted() {
    let engine = ScriptedEngine::new(vec![response(
        vec![hit("a", "a", 0.2), hit("b", "b", 0.9), hit("c", "c", 0.5)],
        500,
    )]);
    let orchestrator = SearchOrchestrator::builder().engine(engine).build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(ids(&result.results), vec!["b", "c", "a"]);
    assert_eq!(result.total, 3);
}

#[tokio::test]
async fn test_keyword_supplementation() {
    let engine = ScriptedEngine::new(vec![
        response(vec![hit("k1", "Glaucoma", 2.0), hit("k2", "GLC risk", 1.5)], 2),
        response(
            vec![
                hit("k1", "already returned", 0.9),
                hit("v1", "Optic nerve damage", 0.5),
                hit("v2", "Barely similar", 0.05),
            ],
            3,
        ),
    ]);
    let embedder = Arc::new(FixedEmbedder::default());
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine.clone())
        .embedder(embedder.clone())
        .expander(Arc::new(FixedExpander(vec!["glaucoma", "GLC"])))
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(ids(&result.results), vec!["k1", "k2", "v1"]);
    assert_eq!(result.results[0].source, SearchType::Keyword);
    assert_eq!(result.results[2].source, SearchType::Vector);
    assert_eq!(
        result.results[2].relevance_reason.as_deref(),
        Some(NOT_EVALUATED)
    );
    assert_eq!(result.total, 3);

    let calls = engine.calls();
    assert_eq!(calls.len(), 2);
    let must_not = calls[1].body["query"]["bool"]["must_not"].as_array().unwrap();
    assert_eq!(must_not[0]["terms"]["id"], serde_json::json!(["k1", "k2"]));
    assert_eq!(calls[1].body["size"], 10_000 - 2);

    assert_eq!(embedder.texts(), vec!["glaucoma glaucoma GLC".to_string()]);
}

#[tokio::test]
async fn test_supplement_scores_just_below_minimum_are_dropped() {
    let engine = ScriptedEngine::new(vec![
        response(vec![hit("k1", "Glaucoma", 2.0)], 1),
        response(
            vec![
                hit("v1", "Optic nerve", 0.09999999999),
                hit("v2", "Optic disc", 0.1),
            ],
            2,
        ),
    ]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine)
        .embedder(Arc::new(FixedEmbedder::default()))
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(ids(&result.results), vec!["k1", "v2"]);
    assert_eq!(result.results[1].score, 0.1);
    assert_eq!(result.total, 2);
}

#[tokio::test]
async fn test_supplement_candidates_pass_relevance_gate() {
    let engine = ScriptedEngine::new(vec![
        response(vec![hit("k1", "Glaucoma", 2.0), hit("k2", "GLC risk", 1.5)], 2),
        response(
            vec![
                hit("v1", "Glaucoma optic neuropathy", 0.5),
                hit("v2", "Cataract surgery", 0.4),
            ],
            2,
        ),
    ]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine.clone())
        .embedder(Arc::new(FixedEmbedder::default()))
        .relevance_evaluator(Arc::new(MarkerJudge("glaucoma")))
        .build();

    let result = orchestrator
        .search(&SearchRequest::new("glaucoma").enable_llm(true))
        .await;

    assert_eq!(ids(&result.results), vec!["k1", "k2", "v1"]);
    assert_eq!(result.results[2].source, SearchType::Vector);
    assert_eq!(result.results[2].relevance_reason.as_deref(), Some("on topic"));
    assert!(result.results.iter().all(|r| r.id != "v2"));
    assert_eq!(result.total, 3);
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn test_no_supplementation_at_target() {
    let engine = ScriptedEngine::new(vec![response(
        vec![hit("k1", "a", 2.0), hit("k2", "b", 1.0)],
        2,
    )]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine.clone())
        .embedder(Arc::new(FixedEmbedder::default()))
        .tuning(SearchTuning {
            supplement_target: 2,
            ..Default::default()
        })
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(result.results.len(), 2);
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_vector_relevance_gate() {
    let hits = || {
        vec![
            hit("v1", "Glaucoma progression", 0.9),
            hit("v2", "Cataract surgery outcomes", 0.8),
        ]
    };
    let engine = ScriptedEngine::new(vec![response(hits(), 2), response(hits(), 2)]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine.clone())
        .embedder(Arc::new(FixedEmbedder::default()))
        .relevance_evaluator(Arc::new(MarkerJudge("glaucoma")))
        .build();

    let gated = orchestrator
        .search(
            &SearchRequest::new("glaucoma")
                .search_type(SearchType::Vector)
                .enable_llm(true),
        )
        .await;
    assert_eq!(ids(&gated.results), vec!["v1"]);
    assert_eq!(gated.results[0].relevance_reason.as_deref(), Some("on topic"));
    assert_eq!(gated.results[0].source, SearchType::Vector);
    assert!(gated.results[0].matched_keywords.is_none());
    assert_eq!(gated.total, 1);

    let ungated = orchestrator
        .search(&SearchRequest::new("glaucoma").search_type(SearchType::Vector))
        .await;
    assert_eq!(ids(&ungated.results), vec!["v1", "v2"]);
    assert!(ungated
        .results
        .iter()
        .all(|r| r.relevance_reason.as_deref() == Some(NOT_EVALUATED)));

    let calls = engine.calls();
    let knn = &calls[0].body["query"]["bool"]["must"]["knn"]["embedding"];
    assert_eq!(knn["k"], 30);
}

#[tokio::test]
async fn test_vector_gate_without_evaluator_is_pass_through() {
    let engine = ScriptedEngine::new(vec![response(vec![hit("v1", "Unrelated", 0.4)], 1)]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine)
        .embedder(Arc::new(FixedEmbedder::default()))
        .build();

    let result = orchestrator
        .search(
            &SearchRequest::new("glaucoma")
                .search_type(SearchType::Vector)
                .enable_llm(true),
        )
        .await;
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].relevance_reason.as_deref(), Some(NO_CREDENTIAL));
}

#[tokio::test]
async fn test_missing_embedder_gives_empty_response() {
    let engine = ScriptedEngine::new(vec![response(vec![hit("v1", "x", 0.4)], 1)]);
    let orchestrator = SearchOrchestrator::builder().engine(engine.clone()).build();

    for search_type in [SearchType::Vector, SearchType::Hybrid] {
        let result = orchestrator
            .search(&SearchRequest::new("glaucoma").search_type(search_type))
            .await;
        assert_eq!(result.total, 0);
        assert!(result.results.is_empty());
        assert_eq!(result.search_type, search_type);
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_hybrid_truncates_and_keeps_engine_total() {
    let engine = ScriptedEngine::new(vec![response(
        vec![
            hit("h1", "a", 0.9),
            hit("h2", "b", 0.8),
            hit("h3", "c", 0.7),
            hit("h4", "d", 0.6),
            hit("h5", "e", 0.5),
        ],
        42,
    )]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine.clone())
        .embedder(Arc::new(FixedEmbedder::default()))
        .build();

    let result = orchestrator
        .search(
            &SearchRequest::new("glaucoma")
                .search_type(SearchType::Hybrid)
                .page(2)
                .page_size(3),
        )
        .await;

    assert_eq!(result.results.len(), 3);
    assert_eq!(result.total, 42);
    assert!(result
        .results
        .iter()
        .all(|r| r.source == SearchType::Hybrid && r.matched_keywords.is_some()));

    let calls = engine.calls();
    assert_eq!(calls[0].search_pipeline.as_deref(), Some("nlp-search-pipeline"));
    assert_eq!(calls[0].body["from"], 3);
    assert_eq!(calls[0].body["size"], 3);
}

#[tokio::test]
async fn test_rerank_overwrites_scores_by_position() {
    let engine = ScriptedEngine::new(vec![response(
        vec![hit("a", "first", 0.5), hit("b", "second", 0.8)],
        2,
    )]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine)
        .reranker(Arc::new(FixedReranker(vec![0.9, 0.2])))
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(ids(&result.results), vec!["a", "b"]);
    assert_eq!(result.results[0].score, 0.9);
    assert_eq!(result.results[1].score, 0.2);
}

#[tokio::test]
async fn test_duplicates_and_ties() {
    let engine = ScriptedEngine::new(vec![response(
        vec![
            hit("d1", "x", 1.0),
            hit("t1", "x", 0.7),
            hit("d1", "x", 0.5),
            hit("t2", "x", 0.7),
            hit("t3", "x", 0.7),
        ],
        5,
    )]);
    let orchestrator = SearchOrchestrator::builder().engine(engine).build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(ids(&result.results), vec!["d1", "t1", "t2", "t3"]);
    assert_eq!(result.results[0].score, 1.0);
}

#[tokio::test]
async fn test_cache_write_sets_search_id() {
    let engine = ScriptedEngine::new(vec![response(vec![hit("d1", "x", 1.0)], 1)]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine)
        .cache(Arc::new(MemorySearchCache::new(&CacheConfig::default())))
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;
    let search_id = result.search_id.clone().unwrap();

    let stored = orchestrator.load_cached(&search_id).await.unwrap().unwrap();
    assert_eq!(stored.query, "glaucoma");
    assert_eq!(stored.into_response(), result);
}

#[tokio::test]
async fn test_cache_failure_leaves_response_intact() {
    let engine = ScriptedEngine::new(vec![response(vec![hit("d1", "x", 1.0)], 1)]);
    let orchestrator = SearchOrchestrator::builder()
        .engine(engine)
        .cache(Arc::new(FailingCache))
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;

    assert_eq!(result.results.len(), 1);
    assert!(result.search_id.is_none());
}

#[tokio::test]
async fn test_engine_failure_gives_empty_response() {
    let orchestrator = SearchOrchestrator::builder()
        .engine(Arc::new(FailingEngine))
        .build();

    let result = orchestrator.search(&SearchRequest::new("glaucoma")).await;
    assert_eq!(result.total, 0);
    assert!(result.results.is_empty());
    assert!(result.rewritten_terms.is_none());
}

#[tokio::test]
async fn test_query_is_percent_decoded() {
    let engine = ScriptedEngine::new(vec![response(vec![], 0), response(vec![], 0)]);
    let orchestrator = SearchOrchestrator::builder().engine(engine).build();

    let decoded = orchestrator
        .search(&SearchRequest::new("open%20angle%20glaucoma"))
        .await;
    assert_eq!(
        decoded.rewritten_terms,
        Some(vec!["open angle glaucoma".to_string()])
    );

    let plus = orchestrator.search(&SearchRequest::new("a+b")).await;
    assert_eq!(plus.rewritten_terms, Some(vec!["a+b".to_string()]));
}

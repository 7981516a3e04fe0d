//! REST router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use litsearch::cache::MemorySearchCache;
use litsearch::config::{CacheConfig, Config};
use litsearch::{create_router, SearchOrchestrator, ServiceCoordinator};

use crate::common::{hit, response, FailingEngine, ScriptedEngine};

fn app(orchestrator: SearchOrchestrator) -> Router {
    let config = Config::default();
    let server = config.server.clone();
    let coordinator = Arc::new(ServiceCoordinator::from_parts(config, orchestrator));
    create_router(coordinator, &server)
}

fn cached_app() -> Router {
    let engine = ScriptedEngine::new(vec![response(
        vec![hit("d1", "Glaucoma", 2.0), hit("d2", "GLC", 1.0)],
        2,
    )]);
    app(SearchOrchestrator::builder()
        .engine(engine)
        .cache(Arc::new(MemorySearchCache::new(&CacheConfig::default())))
        .build())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_banner() {
    let app = app(SearchOrchestrator::builder().build());
    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "litsearch");
}

#[tokio::test]
async fn test_search_and_cache_roundtrip() {
    let app = cached_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/search",
        Some(json!({"query": "glaucoma", "pageSize": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["searchType"], "keyword");
    assert_eq!(body["results"][0]["id"], "d1");
    assert_eq!(body["results"][0]["source"], "keyword");
    let search_id = body["search_id"].as_str().unwrap().to_string();

    let (status, cached) = send(&app, Method::GET, &format!("/cache/{}", search_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached["results"], body["results"]);

    let (status, metadata) = send(
        &app,
        Method::GET,
        &format!("/cache/{}/metadata", search_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata["results_count"], 2);
    assert_eq!(metadata["query"], "glaucoma");

    let (status, stats) = send(&app, Method::GET, "/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["backend"], "memory");
    assert_eq!(stats["entries"], 1);

    let (status, deleted) =
        send(&app, Method::DELETE, &format!("/cache/{}", search_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], true);

    let (status, _) = send(&app, Method::GET, &format!("/cache/{}", search_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_requests_are_422() {
    let app = cached_app();

    for body in [
        json!({"query": ""}),
        json!({"query": "glaucoma", "page": 0}),
        json!({"query": "glaucoma", "pageSize": 0}),
        json!({"query": "glaucoma", "pageSize": 10001}),
    ] {
        let (status, error) = send(&app, Method::POST, "/search", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["code"], "INVALID_REQUEST");
    }
}

#[tokio::test]
async fn test_unknown_search_type_falls_back_to_keyword() {
    let app = cached_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/search",
        Some(json!({"query": "glaucoma", "searchType": "semantic"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["searchType"], "keyword");
}

#[tokio::test]
async fn test_cache_endpoints_without_cache() {
    let app = app(SearchOrchestrator::builder().build());

    let (status, error) = send(&app, Method::GET, "/cache/stats", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error["code"], "UNAVAILABLE");

    let (status, _) = send(&app, Method::GET, "/cache/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let healthy = app(SearchOrchestrator::builder()
        .engine(ScriptedEngine::new(vec![]))
        .build());
    let (status, body) = send(&healthy, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], true);
    assert_eq!(body["embedder"], false);
    assert_eq!(body["status"], "degraded");

    let down = app(SearchOrchestrator::builder()
        .engine(Arc::new(FailingEngine))
        .build());
    let (status, body) = send(&down, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = cached_app();
    send(&app, Method::POST, "/search", Some(json!({"query": "glaucoma"}))).await;

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("litsearch_search_queries_total"));
}

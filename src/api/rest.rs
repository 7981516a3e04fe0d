//! REST API router.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::api::handlers::{
    cache_stats_handler, delete_cached_handler, get_cached_handler, get_cached_metadata_handler,
    health_handler, metrics_handler, search_handler, ApiState,
};
use crate::config::ServerConfig;
use crate::coordinator::ServiceCoordinator;

/// Create the REST API router.
///
/// Endpoints:
/// - GET    /                     - Service banner
/// - GET    /health               - Collaborator availability
/// - POST   /search               - Run a search
/// - GET    /cache/stats          - Result cache statistics
/// - GET    /cache/:id            - Stored search response
/// - GET    /cache/:id/metadata   - Stored search without results
/// - DELETE /cache/:id            - Delete a stored search
/// - GET    /metrics              - Prometheus metrics
pub fn create_router(coordinator: Arc<ServiceCoordinator>, config: &ServerConfig) -> Router {
    let state = Arc::new(ApiState::new(coordinator));

    Router::new()
        .route("/", get(api_info_handler))
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route(
            "/cache/:id",
            get(get_cached_handler).delete(delete_cached_handler),
        )
        .route("/cache/:id/metadata", get(get_cached_metadata_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(cors_layer(&config.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

async fn api_info_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "litsearch",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Medical literature search over keyword, vector and hybrid retrieval",
        "endpoints": {
            "search": { "method": "POST", "path": "/search" },
            "health": { "method": "GET", "path": "/health" },
            "cache": { "method": "GET", "path": "/cache/:id" },
            "cache_metadata": { "method": "GET", "path": "/cache/:id/metadata" },
            "cache_delete": { "method": "DELETE", "path": "/cache/:id" },
            "cache_stats": { "method": "GET", "path": "/cache/stats" },
            "metrics": { "method": "GET", "path": "/metrics" }
        }
    }))
}

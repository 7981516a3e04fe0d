//! REST API request handlers.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::coordinator::ServiceCoordinator;
use crate::error::SearchServiceError;
use crate::metrics::{get_metrics, HealthState};
use crate::models::SearchRequest;

/// Application state shared across handlers.
pub struct ApiState {
    pub coordinator: Arc<ServiceCoordinator>,
}

impl ApiState {
    pub fn new(coordinator: Arc<ServiceCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
        }
    }
}

/// Deletion acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub search_id: String,
    pub deleted: bool,
}

fn error_response(err: &SearchServiceError) -> Response {
    let (status, code) = match err {
        SearchServiceError::InvalidRequest(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST")
        }
        SearchServiceError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (status, Json(ErrorResponse::new(code, err.to_string()))).into_response()
}

fn not_found(search_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(
            "NOT_FOUND",
            format!("Search not found: {}", search_id),
        )),
    )
        .into_response()
}

/// POST /search
pub async fn search_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SearchRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        debug!(error = %e, "Rejected search request");
        return error_response(&e);
    }

    let response = state.coordinator.search(&request).await;
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /cache/:id
pub async fn get_cached_handler(
    State(state): State<Arc<ApiState>>,
    Path(search_id): Path<String>,
) -> Response {
    match state.coordinator.cached(&search_id).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => not_found(&search_id),
        Err(e) => {
            warn!(search_id = %search_id, error = %e, "Failed to load cached search");
            error_response(&e)
        }
    }
}

/// GET /cache/:id/metadata
pub async fn get_cached_metadata_handler(
    State(state): State<Arc<ApiState>>,
    Path(search_id): Path<String>,
) -> Response {
    match state.coordinator.cached_metadata(&search_id).await {
        Ok(Some(metadata)) => (StatusCode::OK, Json(metadata)).into_response(),
        Ok(None) => not_found(&search_id),
        Err(e) => error_response(&e),
    }
}

/// DELETE /cache/:id
pub async fn delete_cached_handler(
    State(state): State<Arc<ApiState>>,
    Path(search_id): Path<String>,
) -> Response {
    match state.coordinator.delete_cached(&search_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(DeleteResponse {
                search_id,
                deleted: true,
            }),
        )
            .into_response(),
        Ok(false) => not_found(&search_id),
        Err(e) => {
            warn!(search_id = %search_id, error = %e, "Failed to delete cached search");
            error_response(&e)
        }
    }
}

/// GET /cache/stats
pub async fn cache_stats_handler(State(state): State<Arc<ApiState>>) -> Response {
    match state.coordinator.cache_stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /health
///
/// Answers 503 only when the search engine itself is unusable; missing
/// optional collaborators report `degraded` with 200.
pub async fn health_handler(State(state): State<Arc<ApiState>>) -> Response {
    let status = state.coordinator.status().await;
    let code = match status.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(status)).into_response()
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics().export_prometheus(),
    )
}

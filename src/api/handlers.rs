//! API request handlers

use crate::error::StoreError;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Health check
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

/// Health check handler — verifies the store layout is reachable.
///
/// Returns 200 + `"ok"` when the store directories exist, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = state.store.health_check();
    let (http_status, status) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sessions: state.registry.len(),
        }),
    )
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct AnalyticsQuery {
    pub window_days: Option<u32>,
}

/// On-demand analytics aggregation, memoized by the aggregator's TTL cache.
pub async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window_days = query
        .window_days
        .unwrap_or(state.config.analytics_window_days);
    let report = state.aggregator.aggregate(window_days).await?;
    Ok(Json(report))
}

// ============================================================================
// Error translation
// ============================================================================

/// HTTP-facing error for REST handlers.
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Timeout(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Timeout(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Validation(msg) => AppError::BadRequest(msg),
            StoreError::Timeout(limit) => {
                AppError::Timeout(format!("operation timed out after {limit:?}"))
            }
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

//! Admin HTTP API for remote server management
//!
//! Provides REST endpoints for inspecting and repairing chapter sessions.

use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::Server;

mod handlers;

/// Shared state for admin API handlers
pub struct AdminState {
    pub server: Arc<Server>,
    pub api_key: String,
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::<()>::error(message)))
}

/// Map any internal failure to a 500.
pub fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!("Admin request failed: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Internal error: {}", e))
}

/// Verify the API key from request headers
fn verify_api_key(headers: &HeaderMap, expected_key: &str) -> Result<(), ApiError> {
    let provided_key = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        });

    match provided_key {
        Some(key) if !expected_key.is_empty() && key == expected_key => Ok(()),
        Some(_) => Err(api_error(StatusCode::UNAUTHORIZED, "Invalid API key")),
        None => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Missing API key. Use X-API-Key header or Authorization: Bearer <key>",
        )),
    }
}

/// Create the admin API router
pub fn create_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/api/server/stats", get(handlers::server::get_stats))
        .route(
            "/api/players/:id/chapter-state",
            get(handlers::chapter_states::get_chapter_state).delete(handlers::chapter_states::delete_chapter_state),
        )
        .route(
            "/api/players/:id/chapter-progress",
            get(handlers::chapter_progress::list_chapter_progress),
        )
        .route(
            "/api/players/:id/chapter-progress/:chapter_id",
            get(handlers::chapter_progress::get_chapter_progress)
                .put(handlers::chapter_progress::set_chapter_progress)
                .delete(handlers::chapter_progress::delete_chapter_progress),
        )
        .route(
            "/api/players/:id/elite-fleets",
            get(handlers::chapter_states::get_elite_fleets).put(handlers::chapter_states::put_elite_fleets),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the admin API server
pub async fn start_server(
    host: &str,
    port: u16,
    state: Arc<AdminState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Admin API listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_verify_api_key() {
        let mut headers = HeaderMap::new();
        assert!(verify_api_key(&headers, "secret").is_err());

        headers.insert("X-API-Key", HeaderValue::from_static("secret"));
        assert!(verify_api_key(&headers, "secret").is_ok());
        assert!(verify_api_key(&headers, "other").is_err());

        let mut bearer = HeaderMap::new();
        bearer.insert("Authorization", HeaderValue::from_static("Bearer secret"));
        assert!(verify_api_key(&bearer, "secret").is_ok());

        // An unset key never authorizes
        let mut empty = HeaderMap::new();
        empty.insert("X-API-Key", HeaderValue::from_static(""));
        assert!(verify_api_key(&empty, "").is_err());
    }
}

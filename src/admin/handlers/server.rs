//! Server-wide admin endpoints

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::admin::{internal_error, verify_api_key, AdminState, ApiError, ApiResponse};
use crate::db;

#[derive(Serialize)]
pub struct ServerStats {
    pub online_commanders: usize,
    pub total_connections: usize,
    pub chapter_sessions: i64,
}

/// GET /api/server/stats - Get server statistics
pub async fn get_stats(
    headers: HeaderMap,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<ServerStats>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;

    let server = &state.server;
    let chapter_sessions = db::count_chapter_states(&server.db).await.map_err(internal_error)?;

    let stats = ServerStats {
        online_commanders: server.online.len(),
        total_connections: server.connection_count(),
        chapter_sessions,
    };

    Ok(Json(ApiResponse::success(stats)))
}

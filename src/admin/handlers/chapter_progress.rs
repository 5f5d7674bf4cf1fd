//! Chapter progress admin endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::admin::{api_error, internal_error, verify_api_key, AdminState, ApiError, ApiResponse};
use crate::db::{self, ChapterProgress};

#[derive(Debug, Serialize, PartialEq)]
pub struct ChapterProgressView {
    pub chapter_id: i64,
    pub progress: i64,
    pub kill_boss_count: i64,
    pub kill_enemy_count: i64,
    pub take_box_count: i64,
    pub defeat_count: i64,
    pub today_defeat_count: i64,
    pub pass_count: i64,
    pub updated_at: i64,
}

impl From<ChapterProgress> for ChapterProgressView {
    fn from(row: ChapterProgress) -> Self {
        Self {
            chapter_id: row.chapter_id,
            progress: row.progress,
            kill_boss_count: row.kill_boss_count,
            kill_enemy_count: row.kill_enemy_count,
            take_box_count: row.take_box_count,
            defeat_count: row.defeat_count,
            today_defeat_count: row.today_defeat_count,
            pass_count: row.pass_count,
            updated_at: row.updated_at,
        }
    }
}

/// Counters to store. Omitted counters are written as zero.
#[derive(Deserialize)]
pub struct SetChapterProgressRequest {
    pub progress: u32,
    #[serde(default)]
    pub kill_boss_count: u32,
    #[serde(default)]
    pub kill_enemy_count: u32,
    #[serde(default)]
    pub take_box_count: u32,
    #[serde(default)]
    pub defeat_count: u32,
    #[serde(default)]
    pub today_defeat_count: u32,
    #[serde(default)]
    pub pass_count: u32,
}

#[derive(Serialize)]
pub struct DeleteChapterProgressResponse {
    pub commander_id: i64,
    pub chapter_id: i64,
    pub message: String,
}

async fn require_commander(state: &AdminState, commander_id: i64) -> Result<(), ApiError> {
    db::get_commander(&state.server.db, commander_id)
        .await
        .map_err(internal_error)?
        .map(|_| ())
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Commander {} not found", commander_id)))
}

/// GET /api/players/:id/chapter-progress - All progress rows of a commander
pub async fn list_chapter_progress(
    headers: HeaderMap,
    Path(commander_id): Path<i64>,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<Vec<ChapterProgressView>>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;
    require_commander(&state, commander_id).await?;

    let rows = db::list_chapter_progress(&state.server.db, commander_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(ApiResponse::success(rows.into_iter().map(ChapterProgressView::from).collect())))
}

/// GET /api/players/:id/chapter-progress/:chapter_id - One progress row
pub async fn get_chapter_progress(
    headers: HeaderMap,
    Path((commander_id, chapter_id)): Path<(i64, i64)>,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<ChapterProgressView>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;
    require_commander(&state, commander_id).await?;

    let row = db::get_chapter_progress(&state.server.db, commander_id, chapter_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Chapter progress not found"))?;

    Ok(Json(ApiResponse::success(row.into())))
}

/// PUT /api/players/:id/chapter-progress/:chapter_id - Create or overwrite a progress row
pub async fn set_chapter_progress(
    headers: HeaderMap,
    Path((commander_id, chapter_id)): Path<(i64, i64)>,
    State(state): State<Arc<AdminState>>,
    Json(request): Json<SetChapterProgressRequest>,
) -> Result<Json<ApiResponse<ChapterProgressView>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;
    require_commander(&state, commander_id).await?;

    let row = ChapterProgress {
        commander_id,
        chapter_id,
        progress: i64::from(request.progress),
        kill_boss_count: i64::from(request.kill_boss_count),
        kill_enemy_count: i64::from(request.kill_enemy_count),
        take_box_count: i64::from(request.take_box_count),
        defeat_count: i64::from(request.defeat_count),
        today_defeat_count: i64::from(request.today_defeat_count),
        pass_count: i64::from(request.pass_count),
        updated_at: chrono::Utc::now().timestamp(),
    };
    db::upsert_chapter_progress(&state.server.db, &row)
        .await
        .map_err(internal_error)?;

    info!(
        "Admin set chapter {} progress of commander {} to {}",
        chapter_id, commander_id, row.progress
    );

    Ok(Json(ApiResponse::success(row.into())))
}

/// DELETE /api/players/:id/chapter-progress/:chapter_id
pub async fn delete_chapter_progress(
    headers: HeaderMap,
    Path((commander_id, chapter_id)): Path<(i64, i64)>,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<DeleteChapterProgressResponse>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;

    let deleted = db::delete_chapter_progress(&state.server.db, commander_id, chapter_id)
        .await
        .map_err(internal_error)?;
    if !deleted {
        return Err(api_error(StatusCode::NOT_FOUND, "Chapter progress not found"));
    }

    info!("Admin removed chapter {} progress of commander {}", chapter_id, commander_id);

    Ok(Json(ApiResponse::success(DeleteChapterProgressResponse {
        commander_id,
        chapter_id,
        message: "Chapter progress deleted".to_string(),
    })))
}

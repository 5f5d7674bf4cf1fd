//! Chapter session admin endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::admin::{api_error, internal_error, verify_api_key, AdminState, ApiError, ApiResponse};
use crate::chapter::elite_fleet::{elite_fleets, replace_elite_fleets};
use crate::db::{self, ChapterState};
use crate::protocol::{ChapterCellInfo, CurrentChapterInfo, FleetInfo, GroupInChapter, Preserved, TeamInfo};

#[derive(Serialize)]
pub struct ChapterStateView {
    pub commander_id: i64,
    pub commander_name: Option<String>,
    pub online: bool,
    pub chapter_id: i64,
    pub updated_at: i64,
    pub expires_at: u32,
    pub round: u32,
    pub move_step_count: u32,
    pub init_ship_count: u32,
    pub loop_flag: u32,
    pub groups: Vec<GroupView>,
    pub cells: Vec<CellView>,
    pub operation_buff: Vec<u32>,
    pub elite_fleet_count: usize,
}

#[derive(Serialize)]
pub struct GroupView {
    pub id: u32,
    pub kind: &'static str,
    pub row: u32,
    pub column: u32,
    pub step_count: u32,
    pub bullet: u32,
    pub ships: Vec<u32>,
}

impl GroupView {
    fn new(kind: &'static str, group: &GroupInChapter) -> Self {
        let pos = group.pos.unwrap_or_default();
        Self {
            id: group.id,
            kind,
            row: pos.row,
            column: pos.column,
            step_count: group.step_count,
            bullet: group.bullet,
            ships: group.ship_list.iter().map(|ship| ship.id).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct CellView {
    pub row: u32,
    pub column: u32,
    pub item_type: u32,
    pub item_id: u32,
    pub item_flag: u32,
}

impl From<&ChapterCellInfo> for CellView {
    fn from(cell: &ChapterCellInfo) -> Self {
        let pos = cell.pos.unwrap_or_default();
        Self {
            row: pos.row,
            column: pos.column,
            item_type: cell.item_type,
            item_id: cell.item_id(),
            item_flag: cell.item_flag,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TeamDto {
    pub id: u32,
    #[serde(default)]
    pub ship_list: Vec<u32>,
    #[serde(default)]
    pub commander_main: Option<u32>,
    #[serde(default)]
    pub commander_sub: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FleetDto {
    pub id: u32,
    #[serde(default)]
    pub main_team: Vec<TeamDto>,
    #[serde(default)]
    pub submarine_team: Vec<TeamDto>,
    #[serde(default)]
    pub support_team: Vec<TeamDto>,
}

impl From<&TeamInfo> for TeamDto {
    fn from(team: &TeamInfo) -> Self {
        Self {
            id: team.id,
            ship_list: team.ship_list.clone(),
            commander_main: team.commander_main,
            commander_sub: team.commander_sub,
        }
    }
}

impl From<&TeamDto> for TeamInfo {
    fn from(team: &TeamDto) -> Self {
        Self {
            id: team.id,
            ship_list: team.ship_list.clone(),
            commander_main: team.commander_main,
            commander_sub: team.commander_sub,
        }
    }
}

impl From<&FleetInfo> for FleetDto {
    fn from(fleet: &FleetInfo) -> Self {
        Self {
            id: fleet.id,
            main_team: fleet.main_team.iter().map(TeamDto::from).collect(),
            submarine_team: fleet.submarine_team.iter().map(TeamDto::from).collect(),
            support_team: fleet.support_team.iter().map(TeamDto::from).collect(),
        }
    }
}

impl From<&FleetDto> for FleetInfo {
    fn from(fleet: &FleetDto) -> Self {
        Self {
            id: fleet.id,
            main_team: fleet.main_team.iter().map(TeamInfo::from).collect(),
            submarine_team: fleet.submarine_team.iter().map(TeamInfo::from).collect(),
            support_team: fleet.support_team.iter().map(TeamInfo::from).collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct ReplaceEliteFleetsRequest {
    pub fleets: Vec<FleetDto>,
}

#[derive(Serialize)]
pub struct DeleteChapterStateResponse {
    pub commander_id: i64,
    pub message: String,
}

/// Live session row of a commander, 404 if there is none.
async fn load_state(state: &AdminState, commander_id: i64) -> Result<ChapterState, ApiError> {
    let server = &state.server;
    let now = chrono::Utc::now().timestamp();
    db::get_chapter_state(&server.db, commander_id, server.config.chapter.session.ttl_secs, now)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Commander {} has no chapter session", commander_id)))
}

fn decode_state(row: &ChapterState) -> Result<Preserved<CurrentChapterInfo>, ApiError> {
    Preserved::decode(&row.state).map_err(internal_error)
}

/// GET /api/players/:id/chapter-state - Decoded chapter session
pub async fn get_chapter_state(
    headers: HeaderMap,
    Path(commander_id): Path<i64>,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<ChapterStateView>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;

    let row = load_state(&state, commander_id).await?;
    let session = decode_state(&row)?;
    let elite_fleet_count = elite_fleets(&session).map_err(internal_error)?.len();
    let current = &session.message;

    let server = &state.server;
    let commander_name = db::get_commander(&server.db, commander_id)
        .await
        .map_err(internal_error)?
        .map(|commander| commander.name);
    let online = u32::try_from(commander_id)
        .ok()
        .and_then(|id| server.online.session_of(id))
        .is_some();

    let groups = current
        .main_group_list
        .iter()
        .map(|group| GroupView::new("main", group))
        .chain(current.submarine_group_list.iter().map(|group| GroupView::new("submarine", group)))
        .chain(current.support_group_list.iter().map(|group| GroupView::new("support", group)))
        .collect();

    Ok(Json(ApiResponse::success(ChapterStateView {
        commander_id: row.commander_id,
        commander_name,
        online,
        chapter_id: row.chapter_id,
        updated_at: row.updated_at,
        expires_at: current.time,
        round: current.round,
        move_step_count: current.move_step_count,
        init_ship_count: current.init_ship_count,
        loop_flag: current.loop_flag,
        groups,
        cells: current.cell_list.iter().map(CellView::from).collect(),
        operation_buff: current.operation_buff.clone(),
        elite_fleet_count,
    })))
}

/// DELETE /api/players/:id/chapter-state - Force a retreat
pub async fn delete_chapter_state(
    headers: HeaderMap,
    Path(commander_id): Path<i64>,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<DeleteChapterStateResponse>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;

    let deleted = db::delete_chapter_state(&state.server.db, commander_id)
        .await
        .map_err(internal_error)?;
    if !deleted {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Commander {} has no chapter session", commander_id),
        ));
    }

    info!("Admin removed chapter session of commander {}", commander_id);

    Ok(Json(ApiResponse::success(DeleteChapterStateResponse {
        commander_id,
        message: "Chapter session deleted".to_string(),
    })))
}

/// GET /api/players/:id/elite-fleets - Elite fleet records of the session
pub async fn get_elite_fleets(
    headers: HeaderMap,
    Path(commander_id): Path<i64>,
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ApiResponse<Vec<FleetDto>>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;

    let row = load_state(&state, commander_id).await?;
    let fleets = elite_fleets(&decode_state(&row)?).map_err(internal_error)?;

    Ok(Json(ApiResponse::success(fleets.iter().map(FleetDto::from).collect())))
}

/// PUT /api/players/:id/elite-fleets - Replace every elite fleet record
pub async fn put_elite_fleets(
    headers: HeaderMap,
    Path(commander_id): Path<i64>,
    State(state): State<Arc<AdminState>>,
    Json(request): Json<ReplaceEliteFleetsRequest>,
) -> Result<Json<ApiResponse<Vec<FleetDto>>>, ApiError> {
    verify_api_key(&headers, &state.api_key)?;

    let row = load_state(&state, commander_id).await?;
    let mut session = decode_state(&row)?;
    let fleets: Vec<FleetInfo> = request.fleets.iter().map(FleetInfo::from).collect();
    replace_elite_fleets(&mut session, &fleets).map_err(internal_error)?;

    let now = chrono::Utc::now().timestamp();
    db::upsert_chapter_state(&state.server.db, commander_id, row.chapter_id, &session.encode_to_vec(), now)
        .await
        .map_err(internal_error)?;

    info!(
        "Admin replaced elite fleets of commander {} ({} records)",
        commander_id,
        fleets.len()
    );

    Ok(Json(ApiResponse::success(request.fleets)))
}

//! Browse and site-analysis endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use skyqc_common::human_size::format_size;

use crate::error::{ApiError, ApiResult};
use crate::models::SiteInfo;
use crate::services::flight_path::{self, FlightPathPayload};
use crate::services::outlier_classifier;
use crate::services::site_analyzer::{parse_site_path, SiteAnalyzer};
use crate::services::{file_service, ActiveConnection};
use crate::transport::RemoteEntry;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub path: String,
    pub entries: Vec<RemoteEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub path: String,
}

/// Per-folder summary row for the analysis table.
#[derive(Debug, Serialize)]
pub struct FolderSummary {
    pub folder_name: String,
    pub image_count: usize,
    pub gps_count: usize,
    pub total_size: String,
    pub color: String,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub site_info: SiteInfo,
    pub folders: Vec<FolderSummary>,
    pub total_images: usize,
    pub total_size: String,
    pub flight_path: FlightPathPayload,
}

async fn checkout(state: &AppState, session_id: &str) -> ApiResult<ActiveConnection> {
    state
        .connections
        .checkout(session_id)
        .await
        .ok_or_else(|| ApiError::UnknownSession(session_id.to_string()))
}

/// GET /api/sessions/:session_id/browse?path=/
pub async fn browse(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<BrowseQuery>,
) -> ApiResult<Json<BrowseResponse>> {
    let connection = checkout(&state, &session_id).await?;
    let path = query.path.unwrap_or_else(|| "/".to_string());
    let entries = file_service::list_directory(connection.session.as_ref(), &path).await?;
    Ok(Json(BrowseResponse { path, entries }))
}

/// GET /api/sessions/:session_id/site-info?path=...
///
/// Parse pilot and site identity from a path without analyzing it. The
/// session is still validated so an unknown id reports 404 here as it
/// does on the other session routes.
pub async fn site_info(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<BrowseQuery>,
) -> ApiResult<Json<SiteInfo>> {
    checkout(&state, &session_id).await?;
    let path = query
        .path
        .ok_or_else(|| ApiError::BadRequest("path query parameter required".to_string()))?;
    Ok(Json(parse_site_path(&path)))
}

/// POST /api/sessions/:session_id/analyze
///
/// Full pipeline: walk the site folders, extract GPS fixes, classify
/// outliers, and assemble the flight path payload.
pub async fn analyze(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    if request.path.is_empty() {
        return Err(ApiError::BadRequest("path must not be empty".to_string()));
    }
    let connection = checkout(&state, &session_id).await?;

    let analyzer = SiteAnalyzer::new(state.config.clone());
    let analysis = analyzer
        .analyze(
            connection.session.as_ref(),
            connection.factory.as_ref(),
            &connection.pool_key(),
            &request.path,
        )
        .await?;

    let classification = outlier_classifier::classify(&analysis.points, &state.config);
    let payload = flight_path::build(&analysis, &classification, &state.config);

    let folders = analysis
        .folders
        .values()
        .map(|f| FolderSummary {
            folder_name: f.folder_name.clone(),
            image_count: f.image_count,
            gps_count: f.gps_count(),
            total_size: format_size(f.total_size_bytes),
            color: f.color.clone(),
            failed: f.failed,
            error: f.error.clone(),
        })
        .collect();

    Ok(Json(AnalyzeResponse {
        site_info: analysis.site_info.clone(),
        folders,
        total_images: analysis.total_images,
        total_size: format_size(analysis.total_size_bytes),
        flight_path: payload,
    }))
}

/// Build browse/analysis routes
pub fn site_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions/:session_id/browse", get(browse))
        .route("/api/sessions/:session_id/site-info", get(site_info))
        .route("/api/sessions/:session_id/analyze", post(analyze))
}

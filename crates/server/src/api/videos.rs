//! Catalog read endpoints and viewer engagement.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use reelpipe_core::{CatalogRecord, Reaction, ReactionCounts, VideoQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::middleware::AuthUser;
use super::{api_error, catalog_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for list queries
const MAX_LIMIT: u32 = 200;

/// Default limit for list queries
const DEFAULT_LIMIT: u32 = 50;

/// Default number of trending videos
const DEFAULT_TRENDING_LIMIT: u32 = 20;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListVideosParams {
    /// Text matched against title, description and hashtags
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<CatalogRecord>,
    pub total: usize,
}

/// Optional body for watch and reaction calls.
///
/// Without an explicit viewer the caller's owner reference is used.
#[derive(Debug, Default, Deserialize)]
pub struct WatchBody {
    pub viewer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    /// Whether this call added a view.
    pub counted: bool,
    pub views: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReactionBody {
    pub reaction: Reaction,
    pub viewer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    #[serde(flatten)]
    pub counts: ReactionCounts,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/videos
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListVideosParams>,
) -> Result<Json<VideoListResponse>, ApiError> {
    let query = VideoQuery {
        query: params.q.filter(|q| !q.trim().is_empty()),
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    };

    let videos = state.catalog().search(&query).map_err(catalog_error)?;
    let total = videos.len();
    Ok(Json(VideoListResponse { videos, total }))
}

/// GET /api/v1/videos/trending
pub async fn trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<VideoListResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TRENDING_LIMIT)
        .clamp(1, MAX_LIMIT);
    let videos = state.catalog().trending(limit).map_err(catalog_error)?;
    let total = videos.len();
    Ok(Json(VideoListResponse { videos, total }))
}

/// GET /api/v1/videos/{id}
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CatalogRecord>, ApiError> {
    state
        .catalog()
        .get(&id)
        .map(Json)
        .map_err(catalog_error)
}

/// POST /api/v1/videos/{id}/watch
pub async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(owner): AuthUser,
    body: Option<Json<WatchBody>>,
) -> Result<Json<WatchResponse>, ApiError> {
    let viewer = viewer_or_owner(body.and_then(|Json(b)| b.viewer), owner)?;
    let catalog = state.catalog();

    let counted = catalog
        .record_view(&id, &viewer, Utc::now())
        .map_err(catalog_error)?;
    let views = catalog.get(&id).map_err(catalog_error)?.views;

    Ok(Json(WatchResponse { counted, views }))
}

/// POST /api/v1/videos/{id}/reaction
pub async fn set_reaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(owner): AuthUser,
    Json(body): Json<ReactionBody>,
) -> Result<Json<ReactionResponse>, ApiError> {
    let viewer = viewer_or_owner(body.viewer, owner)?;
    let counts = state
        .catalog()
        .set_reaction(&id, &viewer, body.reaction)
        .map_err(catalog_error)?;
    Ok(Json(ReactionResponse { counts }))
}

fn viewer_or_owner(viewer: Option<String>, owner: String) -> Result<String, ApiError> {
    match viewer {
        Some(v) if v.trim().is_empty() => Err(api_error(
            StatusCode::BAD_REQUEST,
            "viewer must not be empty",
        )),
        Some(v) => Ok(v.trim().to_string()),
        None => Ok(owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_falls_back_to_owner() {
        assert_eq!(viewer_or_owner(None, "alice".into()).unwrap(), "alice");
        assert_eq!(
            viewer_or_owner(Some(" bob ".into()), "alice".into()).unwrap(),
            "bob"
        );
        let (status, _) = viewer_or_owner(Some("  ".into()), "alice".into()).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

//! Read-only retrieval of packaged renditions and posters.
//!
//! Every path component comes from the URL, so each one is checked before it
//! touches the filesystem: folders and files must be plain names, qualities
//! must be configured ladder labels, and rendition files are limited to the
//! sub-manifest and `NNN.ts` segments.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reelpipe_core::layout::{MASTER_MANIFEST, SUB_MANIFEST};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use super::{api_error, ApiError};
use crate::state::AppState;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

static SEGMENT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,}\.ts$").unwrap());

/// A single path component made of safe characters, not starting with a dot.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn image_content_type(file: &str) -> Option<&'static str> {
    let extension = file.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(content_type)
}

async fn serve_file(path: PathBuf, content_type: &'static str) -> Result<Response, ApiError> {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(api_error(StatusCode::NOT_FOUND, "Not found"))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read media file");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file"))
        }
    }
}

fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Not found")
}

/// GET /api/v1/stream/{folder}/master.m3u8
pub async fn master_manifest(
    State(state): State<Arc<AppState>>,
    Path(folder): Path<String>,
) -> Result<Response, ApiError> {
    if !is_plain_name(&folder) {
        return Err(not_found());
    }
    let path = state.storage().job(&folder).master_manifest_path();
    serve_file(path, PLAYLIST_CONTENT_TYPE).await
}

/// GET /api/v1/stream/{folder}/{quality}/{file}
pub async fn rendition_file(
    State(state): State<Arc<AppState>>,
    Path((folder, quality, file)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    if !is_plain_name(&folder) {
        return Err(not_found());
    }
    if !state
        .coordinator()
        .ladder()
        .iter()
        .any(|tier| tier.label == quality)
    {
        return Err(not_found());
    }

    let content_type = if file == SUB_MANIFEST {
        PLAYLIST_CONTENT_TYPE
    } else if SEGMENT_NAME.is_match(&file) {
        SEGMENT_CONTENT_TYPE
    } else {
        return Err(not_found());
    };

    let path = state.storage().job(&folder).rendition_dir(&quality).join(&file);
    serve_file(path, content_type).await
}

/// GET /api/v1/thumbnails/{file}
pub async fn thumbnail(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    if !is_plain_name(&file) {
        return Err(not_found());
    }
    let content_type = image_content_type(&file).ok_or_else(not_found)?;
    let path = state.storage().thumbnails_dir().join(&file);
    serve_file(path, content_type).await
}

/// Master manifest URL for a storage folder, as served by this router.
pub fn master_url(folder: &str) -> String {
    format!("/api/v1/stream/{}/{}", folder, MASTER_MANIFEST)
}

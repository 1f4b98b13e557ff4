//! Upload endpoint.
//!
//! The multipart body is written to `incoming/` chunk by chunk, then handed to
//! the ingest coordinator. The response streams one JSON line per progress
//! event; the last line carries `"done": true`. The job keeps running when the
//! client goes away.

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use reelpipe_core::{IngestRequest, JobOutcome, ProgressEvent, SuppliedThumbnail};
use serde_json::Value;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::media::master_url;
use super::middleware::AuthUser;
use super::{api_error, ApiError};
use crate::metrics::UPLOADS_RECEIVED;
use crate::state::AppState;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Longest client filename kept in the incoming file name.
const MAX_NAME_LEN: usize = 64;

/// Files received so far. Removed again if the request turns out invalid.
#[derive(Default)]
struct ReceivedUpload {
    video: Option<PathBuf>,
    thumbnail: Option<SuppliedThumbnail>,
    title: String,
    description: String,
}

impl ReceivedUpload {
    async fn discard(self) {
        let paths = self
            .video
            .into_iter()
            .chain(self.thumbnail.map(|t| t.path));
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), error = %e, "Failed to remove partial upload");
            }
        }
    }
}

/// POST /api/v1/videos
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    AuthUser(owner): AuthUser,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let incoming = state.storage().incoming_dir();
    if let Err(e) = tokio::fs::create_dir_all(&incoming).await {
        warn!(error = %e, "Failed to create incoming directory");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Upload storage unavailable",
        ));
    }

    let upload = receive(multipart, &incoming).await?;
    UPLOADS_RECEIVED.inc();
    info!(
        owner = %owner,
        title = %upload.title,
        has_video = upload.video.is_some(),
        has_thumbnail = upload.thumbnail.is_some(),
        "Upload received"
    );

    let request = IngestRequest {
        source: upload.video,
        title: upload.title,
        description: upload.description,
        thumbnail: upload.thumbnail,
        owner,
    };
    let rx = state.coordinator().submit(request);

    Ok(progress_response(rx))
}

async fn receive(mut multipart: Multipart, incoming: &Path) -> Result<ReceivedUpload, ApiError> {
    let mut upload = ReceivedUpload::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                upload.discard().await;
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart body: {}", e),
                ));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        let result = match name.as_str() {
            "video" => save_field(field, incoming, "video").await.map(|(path, _)| {
                upload.video = Some(path);
            }),
            "thumbnail" => save_field(field, incoming, "thumbnail")
                .await
                .map(|(path, original_name)| {
                    upload.thumbnail = Some(SuppliedThumbnail {
                        path,
                        original_name,
                    });
                }),
            "title" => field
                .text()
                .await
                .map(|text| upload.title = text.trim().to_string())
                .map_err(FieldError::from),
            "description" => field
                .text()
                .await
                .map(|text| upload.description = text.trim().to_string())
                .map_err(FieldError::from),
            _ => {
                debug!(field = %name, "Ignoring unknown multipart field");
                Ok(())
            }
        };

        if let Err(e) = result {
            upload.discard().await;
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Failed to read field '{}': {}", name, e),
            ));
        }
    }

    Ok(upload)
}

/// Streams a file field to a fresh file in `incoming/`.
///
/// Returns the stored path and the client filename.
async fn save_field(
    mut field: Field<'_>,
    incoming: &Path,
    kind: &str,
) -> Result<(PathBuf, Option<String>), FieldError> {
    let original_name = field.file_name().map(str::to_string);
    let path = incoming.join(incoming_name(kind, original_name.as_deref()));

    let mut file = tokio::fs::File::create(&path).await?;
    let written = async {
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok::<_, FieldError>(())
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %rm, "Failed to remove partial upload");
        }
        return Err(e);
    }

    Ok((path, original_name))
}

#[derive(Debug, Error)]
enum FieldError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Unique name for an incoming file; keeps a sanitized client filename for
/// its extension and for operators reading the directory.
fn incoming_name(kind: &str, original: Option<&str>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let cleaned: String = original
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let skip = cleaned.len().saturating_sub(MAX_NAME_LEN);
    let cleaned = &cleaned[skip..];

    if cleaned.is_empty() {
        format!("{}_{}", kind, id)
    } else {
        format!("{}_{}_{}", kind, id, cleaned)
    }
}

/// Serializes a progress event as one NDJSON line.
pub fn ndjson_line(event: &ProgressEvent) -> String {
    let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("done".to_string(), Value::Bool(event.is_done()));
        if let ProgressEvent::Done {
            job_id,
            outcome: JobOutcome::Succeeded { .. },
            ..
        } = event
        {
            map.insert("stream_url".to_string(), Value::String(master_url(job_id)));
        }
    }
    let mut line = value.to_string();
    line.push('\n');
    line
}

fn progress_response(rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Response {
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(ndjson_line(&event)), rx))
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

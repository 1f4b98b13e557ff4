//! Poster resolution.
//!
//! A supplied image is adopted into the thumbnail store keeping its format.
//! Without one (or if adoption fails) a frame is captured near mid-length.
//! If that fails too, the shared placeholder is used. The returned path
//! always exists.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ErrorClass;
use super::types::{Degradation, JobContext, SuppliedThumbnail};
use crate::encoder::{FrameCapture, MediaEncoder};
use crate::layout::StorageLayout;

/// Image formats accepted for a supplied poster.
pub const POSTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Where the chosen poster came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PosterSource {
    Supplied,
    Captured,
    Placeholder,
}

/// The chosen poster.
#[derive(Debug, Clone)]
pub struct Poster {
    pub path: PathBuf,
    pub source: PosterSource,
}

/// Outcome of poster resolution; never fails.
#[derive(Debug, Clone)]
pub struct PosterResolution {
    pub poster: Poster,
    pub degradations: Vec<Degradation>,
}

pub struct PosterResolver {
    encoder: Arc<dyn MediaEncoder>,
    storage: StorageLayout,
}

impl PosterResolver {
    pub fn new(encoder: Arc<dyn MediaEncoder>, storage: StorageLayout) -> Self {
        Self { encoder, storage }
    }

    /// `duration_secs` is the measured source length; the captured frame is
    /// taken at its midpoint, or at the start when it is unknown.
    pub async fn resolve(
        &self,
        ctx: &JobContext,
        supplied: Option<SuppliedThumbnail>,
        duration_secs: Option<f64>,
    ) -> PosterResolution {
        let mut degradations = Vec::new();

        if let Some(supplied) = supplied {
            match self.adopt(ctx, &supplied).await {
                Ok(path) => {
                    debug!(job_id = %ctx.job_id, path = %path.display(), "Adopted supplied poster");
                    return PosterResolution {
                        poster: Poster {
                            path,
                            source: PosterSource::Supplied,
                        },
                        degradations,
                    };
                }
                Err(message) => {
                    warn!(job_id = %ctx.job_id, error = %message, "Supplied poster rejected");
                    degradations.push(Degradation::new(ErrorClass::ThumbnailError, message));
                }
            }
        }

        match self.capture(ctx, duration_secs).await {
            Ok(path) => {
                debug!(job_id = %ctx.job_id, path = %path.display(), "Captured poster frame");
                PosterResolution {
                    poster: Poster {
                        path,
                        source: PosterSource::Captured,
                    },
                    degradations,
                }
            }
            Err(message) => {
                warn!(
                    job_id = %ctx.job_id,
                    error = %message,
                    "Frame capture failed, using placeholder"
                );
                degradations.push(Degradation::new(ErrorClass::ThumbnailError, message));
                PosterResolution {
                    poster: self.placeholder().await,
                    degradations,
                }
            }
        }
    }

    async fn adopt(
        &self,
        ctx: &JobContext,
        supplied: &SuppliedThumbnail,
    ) -> Result<PathBuf, String> {
        let extension = supplied
            .extension()
            .filter(|ext| POSTER_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| "Supplied thumbnail is not a supported image format".to_string())?;

        let target = ctx.layout.thumbnail_path(&extension);
        move_file(&supplied.path, &target)
            .await
            .map_err(|e| format!("Failed to store supplied thumbnail: {}", e))?;
        Ok(target)
    }

    async fn capture(
        &self,
        ctx: &JobContext,
        duration_secs: Option<f64>,
    ) -> Result<PathBuf, String> {
        let seek_secs = duration_secs
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d / 2.0)
            .unwrap_or(0.0);

        let target = ctx.layout.thumbnail_path("jpg");
        let path = self
            .encoder
            .capture_frame(FrameCapture {
                input_path: ctx.source.clone(),
                output_path: target,
                seek_secs,
            })
            .await
            .map_err(|e| format!("Frame capture failed: {}", e))?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() > 0 => Ok(path),
            _ => Err(format!("Frame capture produced no image at {}", path.display())),
        }
    }

    async fn placeholder(&self) -> Poster {
        let path = match self.storage.ensure_placeholder().await {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Failed to write placeholder thumbnail");
                self.storage.placeholder_thumbnail()
            }
        };
        info!(path = %path.display(), "Using placeholder poster");
        Poster {
            path,
            source: PosterSource::Placeholder,
        }
    }
}

/// Renames, falling back to copy + delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        debug!(path = %from.display(), error = %e, "Could not remove adopted upload");
    }
    Ok(())
}

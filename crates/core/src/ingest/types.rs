//! Types for the ingest module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::error::ErrorClass;
use crate::catalog::CatalogRecord;
use crate::encoder::RenditionOutput;
use crate::ladder::QualityTier;
use crate::layout::JobLayout;

/// Job identifier: a millisecond timestamp plus a short random suffix.
///
/// Also the job's directory name under `hls/` and its storage-folder reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            &suffix[..6]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job lifecycle.
///
/// `Created -> Encoding -> Composing -> Persisting -> Completed`, with
/// `Failed` reachable from `Encoding`, `Composing` and `Persisting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Directories allocated, nothing started.
    Created,
    /// Renditions encoding; probe and poster running alongside.
    Encoding,
    /// Writing the master manifest.
    Composing,
    /// Writing the catalog record.
    Persisting,
    /// Record persisted.
    Completed,
    /// Fatal error.
    Failed,
}

impl JobState {
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Encoding)
                | (Encoding, Composing)
                | (Encoding, Failed)
                | (Composing, Persisting)
                | (Composing, Failed)
                | (Persisting, Completed)
                | (Persisting, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn state_type(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Encoding => "encoding",
            JobState::Composing => "composing",
            JobState::Persisting => "persisting",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// Everything a component needs to know about the job it works for.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub layout: JobLayout,
    pub source: PathBuf,
}

impl JobContext {
    pub fn id(&self) -> &str {
        self.job_id.as_str()
    }
}

/// A caller-supplied poster image.
#[derive(Debug, Clone)]
pub struct SuppliedThumbnail {
    /// Where the upload currently sits.
    pub path: PathBuf,
    /// Filename as sent by the client, used for the image format.
    pub original_name: Option<String>,
}

impl SuppliedThumbnail {
    /// Lowercase image extension, taken from the client filename first.
    pub fn extension(&self) -> Option<String> {
        self.original_name
            .as_deref()
            .map(Path::new)
            .and_then(|p| p.extension())
            .or_else(|| self.path.extension())
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

/// A request to ingest one upload.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Raw source. `None` is an input error.
    pub source: Option<PathBuf>,
    pub title: String,
    pub description: String,
    pub thumbnail: Option<SuppliedThumbnail>,
    /// Owner reference recorded on the catalog record.
    pub owner: String,
}

/// Status of one rendition task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenditionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One encode task per ladder tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenditionTask {
    pub tier: QualityTier,
    /// Rendition directory.
    pub output_dir: PathBuf,
    pub status: RenditionStatus,
    /// Sub-manifest, set once the task succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenditionTask {
    pub fn new(tier: QualityTier, output_dir: PathBuf) -> Self {
        Self {
            tier,
            output_dir,
            status: RenditionStatus::Pending,
            playlist_path: None,
            error: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.tier.label
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == RenditionStatus::Succeeded
    }

    pub(crate) fn succeed(&mut self, output: RenditionOutput) {
        self.status = RenditionStatus::Succeeded;
        self.playlist_path = Some(output.playlist_path);
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = RenditionStatus::Failed;
        self.playlist_path = None;
        self.error = Some(error.into());
    }
}

/// A non-fatal problem recorded during a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub class: ErrorClass,
    pub message: String,
}

impl Degradation {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

/// Fatal error as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub class: ErrorClass,
    pub message: String,
}

/// Final account of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// `None` when the job never got an id (input errors).
    pub job_id: Option<String>,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<CatalogRecord>,
    pub renditions: Vec<RenditionTask>,
    pub degradations: Vec<Degradation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
}

/// A job currently owned by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: String,
    pub title: String,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    /// Rendition label and its latest status.
    pub renditions: Vec<(String, RenditionStatus)>,
}

impl ActiveJob {
    pub(crate) fn set_rendition(&mut self, label: &str, status: RenditionStatus) {
        if let Some(entry) = self.renditions.iter_mut().find(|(l, _)| l == label) {
            entry.1 = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_format() {
        let id = JobId::generate();
        let (stamp, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(stamp.len(), 17);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 6);
    }

    #[test]
    fn test_job_ids_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_state_transitions() {
        use JobState::*;
        assert!(Created.can_transition_to(Encoding));
        assert!(Encoding.can_transition_to(Composing));
        assert!(Encoding.can_transition_to(Failed));
        assert!(Composing.can_transition_to(Persisting));
        assert!(Persisting.can_transition_to(Completed));
        assert!(Persisting.can_transition_to(Failed));

        assert!(!Created.can_transition_to(Failed));
        assert!(!Created.can_transition_to(Completed));
        assert!(!Encoding.can_transition_to(Encoding));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Created));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Persisting.is_terminal());
        assert_eq!(JobState::Composing.state_type(), "composing");
    }

    #[test]
    fn test_supplied_thumbnail_extension() {
        let thumb = SuppliedThumbnail {
            path: PathBuf::from("/incoming/upload-123"),
            original_name: Some("Cover.PNG".to_string()),
        };
        assert_eq!(thumb.extension().as_deref(), Some("png"));

        let thumb = SuppliedThumbnail {
            path: PathBuf::from("/incoming/poster.webp"),
            original_name: None,
        };
        assert_eq!(thumb.extension().as_deref(), Some("webp"));

        let thumb = SuppliedThumbnail {
            path: PathBuf::from("/incoming/blob"),
            original_name: Some("noext".to_string()),
        };
        assert_eq!(thumb.extension(), None);
    }

    #[test]
    fn test_rendition_task_lifecycle() {
        let mut task = RenditionTask::new(
            QualityTier::new("360p", 640, 360, 800_000),
            PathBuf::from("/hls/j/360p"),
        );
        assert_eq!(task.status, RenditionStatus::Pending);

        task.fail("exit code 1");
        assert_eq!(task.status, RenditionStatus::Failed);
        assert!(!task.is_succeeded());
        assert_eq!(task.error.as_deref(), Some("exit code 1"));
    }
}

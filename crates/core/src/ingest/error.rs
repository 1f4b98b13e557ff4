//! Error types for the ingest module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Wire-level classification of everything that can go wrong in a job.
///
/// Fatal classes end the job; the rest are recorded as degradations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// No raw source supplied.
    InputError,
    /// One rendition failed.
    EncodeError,
    /// Every rendition failed.
    TotalEncodeFailure,
    /// Poster could not be adopted or captured; placeholder used.
    ThumbnailError,
    /// Probe failed or returned unusable values; defaults used.
    MetadataError,
    /// Transcript could not be produced; stored without one.
    TranscriptError,
    /// Directory, manifest or catalog write failed.
    PersistenceError,
}

impl ErrorClass {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InputError | Self::TotalEncodeFailure | Self::PersistenceError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputError => "input_error",
            Self::EncodeError => "encode_error",
            Self::TotalEncodeFailure => "total_encode_failure",
            Self::ThumbnailError => "thumbnail_error",
            Self::MetadataError => "metadata_error",
            Self::TranscriptError => "transcript_error",
            Self::PersistenceError => "persistence_error",
        }
    }
}

/// Fatal ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No source file supplied")]
    MissingSource,

    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("All {attempted} renditions failed")]
    TotalEncodeFailure { attempted: usize },

    #[error("Failed to allocate job directory: {0}")]
    Allocation(#[source] std::io::Error),

    #[error("Failed to write master manifest: {0}")]
    Manifest(#[source] std::io::Error),

    #[error("Failed to persist catalog record: {0}")]
    Catalog(#[from] CatalogError),
}

impl IngestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingSource | Self::SourceNotFound { .. } => ErrorClass::InputError,
            Self::TotalEncodeFailure { .. } => ErrorClass::TotalEncodeFailure,
            Self::Allocation(_) | Self::Manifest(_) | Self::Catalog(_) => {
                ErrorClass::PersistenceError
            }
        }
    }
}

//! Types for the video catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One timed line of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Offset from the start of the video, in seconds.
    pub start: f64,
    /// Spoken text.
    pub text: String,
}

/// Everything the ingestion pipeline knows about a finished upload.
///
/// Engagement counters are not part of this type: a new record always
/// starts with zero views, likes and dislikes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    /// Hashtags derived from the description, lowercase, first-seen order.
    pub hashtags: Vec<String>,
    /// Job directory name under `hls/`.
    pub storage_folder: String,
    /// Labels of renditions that were encoded successfully.
    pub available_qualities: Vec<String>,
    /// Poster reference relative to the storage root.
    pub thumbnail: String,
    pub duration_secs: f64,
    pub codec: String,
    /// Source bitrate in bits per second.
    pub bitrate: u64,
    /// Source resolution as `WxH`, or "unknown".
    pub resolution: String,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptSegment>>,
}

/// A persisted catalog record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub storage_folder: String,
    pub available_qualities: Vec<String>,
    pub thumbnail: String,
    pub duration_secs: f64,
    pub codec: String,
    pub bitrate: u64,
    pub resolution: String,
    pub owner: String,
    pub views: u64,
    pub likes: u64,
    pub dislikes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptSegment>>,
    /// Written back periodically by the trending scorer.
    pub trending_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Reaction a viewer can leave on a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
        }
    }
}

/// Like/dislike totals after a reaction change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: u64,
    pub dislikes: u64,
}

/// Engagement inputs for the trending score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    /// Views recorded inside the window.
    pub recent_views: u64,
    /// Total likes.
    pub likes: u64,
    /// Comments posted inside the window.
    pub recent_comments: u64,
}

/// Query for listing/searching the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoQuery {
    /// Case-insensitive text matched against title, description and hashtags.
    #[serde(default)]
    pub query: Option<String>,
    /// Maximum results.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for VideoQuery {
    fn default() -> Self {
        Self {
            query: None,
            limit: default_limit(),
        }
    }
}

fn default_limit() -> u32 {
    50
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

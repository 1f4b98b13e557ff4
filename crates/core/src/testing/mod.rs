//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the ffmpeg backend and the speech-to-text command so
//! whole ingestion jobs can run against a temp directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelpipe_core::testing::{fixtures, MockEncoder};
//!
//! let encoder = MockEncoder::new();
//! encoder.fail_label("1080p").await;
//!
//! let request = fixtures::ingest_request(&source, "Trip", "trip to #paris");
//! ```

mod mock_encoder;
mod mock_transcriber;
mod scripted_catalog;

pub use mock_encoder::{MockEncoder, MOCK_FRAME_BYTES};
pub use mock_transcriber::MockTranscriber;
pub use scripted_catalog::ScriptedCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::catalog::{NewVideo, TranscriptSegment};
    use crate::ingest::{IngestRequest, SuppliedThumbnail};
    use crate::ladder::QualityTier;

    /// Three-tier ladder used by most scenarios.
    pub fn three_tier_ladder() -> Vec<QualityTier> {
        vec![
            QualityTier::new("360p", 640, 360, 800_000),
            QualityTier::new("720p", 1280, 720, 2_800_000),
            QualityTier::new("1080p", 1920, 1080, 5_000_000),
        ]
    }

    /// Request for a raw source without a supplied thumbnail.
    pub fn ingest_request(source: &Path, title: &str, description: &str) -> IngestRequest {
        IngestRequest {
            source: Some(source.to_path_buf()),
            title: title.to_string(),
            description: description.to_string(),
            thumbnail: None,
            owner: "test-owner".to_string(),
        }
    }

    /// Same as [`ingest_request`] with a caller-supplied poster.
    pub fn ingest_request_with_thumbnail(
        source: &Path,
        thumbnail: &Path,
        original_name: &str,
    ) -> IngestRequest {
        IngestRequest {
            thumbnail: Some(SuppliedThumbnail {
                path: thumbnail.to_path_buf(),
                original_name: Some(original_name.to_string()),
            }),
            ..ingest_request(source, "With poster", "")
        }
    }

    /// A fully populated record ready for insertion.
    pub fn new_video(title: &str, storage_folder: &str) -> NewVideo {
        NewVideo {
            title: title.to_string(),
            description: format!("{} #test", title),
            hashtags: vec!["test".to_string()],
            storage_folder: storage_folder.to_string(),
            available_qualities: vec!["360p".to_string(), "720p".to_string()],
            thumbnail: format!("thumbnails/{}.jpg", storage_folder),
            duration_secs: 12.0,
            codec: "h264".to_string(),
            bitrate: 4_000_000,
            resolution: "1920x1080".to_string(),
            owner: "test-owner".to_string(),
            transcript: None,
        }
    }

    /// Two-line transcript.
    pub fn transcript() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment {
                start: 0.0,
                text: "hello".to_string(),
            },
            TranscriptSegment {
                start: 2.5,
                text: "world".to_string(),
            },
        ]
    }

    /// Writes a fake raw upload and returns its path.
    pub async fn write_source(dir: &Path, name: &str) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        tokio::fs::write(&path, b"not really a video").await?;
        Ok(path)
    }
}

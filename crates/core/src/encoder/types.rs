//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ladder::QualityTier;

/// Technical facts about a media file, as reported by the probe backend.
///
/// Every field the backend could not determine is `None`; callers decide
/// how to degrade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Container format (e.g., "mp4", "matroska").
    pub format: String,
    /// Primary video codec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    /// Video stream bitrate in bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<u64>,
    /// Video width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_width: Option<u32>,
    /// Video height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_height: Option<u32>,
    /// Video frame rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_fps: Option<f32>,
    /// Primary audio codec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
}

impl MediaInfo {
    /// Resolution in `WxH` form, when both dimensions are known.
    pub fn resolution(&self) -> Option<String> {
        match (self.video_width, self.video_height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

/// One rendition encode: source in, segmented HLS stream out.
#[derive(Debug, Clone)]
pub struct RenditionJob {
    /// Owning ingest job.
    pub job_id: String,
    /// Raw source.
    pub input_path: PathBuf,
    /// Target tier.
    pub tier: QualityTier,
    /// Rendition directory (segments and sub-manifest live here).
    pub output_dir: PathBuf,
    /// Sub-manifest path (`<output_dir>/index.m3u8`).
    pub playlist_path: PathBuf,
    /// Segment filename pattern (`<output_dir>/%03d.ts`).
    pub segment_pattern: PathBuf,
}

/// Result of a successful rendition encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenditionOutput {
    /// Tier label.
    pub label: String,
    /// Sub-manifest path.
    pub playlist_path: PathBuf,
    /// Number of `.ts` segments written.
    pub segment_count: usize,
    /// Total bytes written into the rendition directory.
    pub output_size_bytes: u64,
    /// Wall-clock encode time in milliseconds.
    pub duration_ms: u64,
}

/// Capture of a single still frame.
#[derive(Debug, Clone)]
pub struct FrameCapture {
    /// Raw source.
    pub input_path: PathBuf,
    /// Where the image is written. The extension selects the image format.
    pub output_path: PathBuf,
    /// Seek point in seconds.
    pub seek_secs: f64,
}

/// Extraction of the audio track into a mono PCM WAV file.
#[derive(Debug, Clone)]
pub struct AudioExtraction {
    /// Raw source.
    pub input_path: PathBuf,
    /// WAV output path.
    pub output_path: PathBuf,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
}

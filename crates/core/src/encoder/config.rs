//! Configuration for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// x264 preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Keyframe interval in frames.
    #[serde(default = "default_gop_size")]
    pub gop_size: u32,

    /// Audio sample rate in Hz.
    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    /// Target HLS segment length in seconds.
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,

    /// Maximum encoder processes running at once, across all jobs.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_encodes: usize,

    /// Per-process timeout in seconds. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Width of captured poster frames; height follows the aspect ratio.
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_preset() -> String {
    "veryfast".to_string()
}

fn default_crf() -> u8 {
    20
}

fn default_gop_size() -> u32 {
    48
}

fn default_audio_sample_rate() -> u32 {
    48_000
}

fn default_segment_duration() -> u32 {
    4
}

fn default_max_parallel() -> usize {
    4
}

fn default_thumbnail_width() -> u32 {
    320
}

fn default_log_level() -> String {
    "warning".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            preset: default_preset(),
            crf: default_crf(),
            gop_size: default_gop_size(),
            audio_sample_rate: default_audio_sample_rate(),
            segment_duration_secs: default_segment_duration(),
            max_parallel_encodes: default_max_parallel(),
            timeout_secs: None,
            thumbnail_width: default_thumbnail_width(),
            ffmpeg_log_level: default_log_level(),
        }
    }
}

impl EncoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the maximum parallel encodes.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel_encodes = max;
        self
    }

    /// Sets the per-process timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

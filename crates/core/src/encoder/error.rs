//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing, encoding or capturing frames.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// Encoder process exited non-zero.
    #[error("Encoding failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encoder exited cleanly but the expected output is missing or empty.
    #[error("Encoder produced no output at {path}")]
    NoOutput { path: PathBuf },

    /// Encoding timed out.
    #[error("Encoding timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoderError {
    /// Creates a new encode failed error with stderr output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Whether the encoder binary itself is unavailable.
    pub fn is_missing_binary(&self) -> bool {
        matches!(
            self,
            Self::FfmpegNotFound { .. } | Self::FfprobeNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_failed_display() {
        let err = EncoderError::encode_failed("exit code 1", Some("boom".to_string()));
        assert_eq!(err.to_string(), "Encoding failed: exit code 1");
    }

    #[test]
    fn test_is_missing_binary() {
        let err = EncoderError::FfmpegNotFound {
            path: PathBuf::from("ffmpeg"),
        };
        assert!(err.is_missing_binary());
        assert!(!EncoderError::probe_failed("bad").is_missing_binary());
    }
}

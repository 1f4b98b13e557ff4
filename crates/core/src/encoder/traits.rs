//! Trait definitions for the encoder module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::EncoderError;
use super::types::{AudioExtraction, FrameCapture, MediaInfo, RenditionJob, RenditionOutput};

/// A media backend that can probe, package renditions and grab stills.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Probes a media file to get its information.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError>;

    /// Encodes one rendition into fixed-length segments plus a sub-manifest.
    ///
    /// Succeeds only if the sub-manifest exists and is non-empty afterwards.
    async fn encode_rendition(&self, job: RenditionJob) -> Result<RenditionOutput, EncoderError>;

    /// Captures one still frame and returns the written image path.
    async fn capture_frame(&self, capture: FrameCapture) -> Result<PathBuf, EncoderError>;

    /// Extracts the audio track and returns the written WAV path.
    async fn extract_audio(&self, extraction: AudioExtraction) -> Result<PathBuf, EncoderError>;

    /// Validates that the encoder is properly configured and ready.
    async fn validate(&self) -> Result<(), EncoderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::QualityTier;

    struct StubEncoder;

    #[async_trait]
    impl MediaEncoder for StubEncoder {
        fn name(&self) -> &str {
            "stub"
        }

        async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
            Ok(MediaInfo {
                path: path.to_path_buf(),
                duration_secs: Some(12.0),
                format: "mp4".to_string(),
                ..Default::default()
            })
        }

        async fn encode_rendition(
            &self,
            job: RenditionJob,
        ) -> Result<RenditionOutput, EncoderError> {
            Ok(RenditionOutput {
                label: job.tier.label,
                playlist_path: job.playlist_path,
                segment_count: 3,
                output_size_bytes: 3 * 1024,
                duration_ms: 10,
            })
        }

        async fn capture_frame(&self, capture: FrameCapture) -> Result<PathBuf, EncoderError> {
            Ok(capture.output_path)
        }

        async fn extract_audio(
            &self,
            extraction: AudioExtraction,
        ) -> Result<PathBuf, EncoderError> {
            Ok(extraction.output_path)
        }

        async fn validate(&self) -> Result<(), EncoderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let encoder: Box<dyn MediaEncoder> = Box::new(StubEncoder);
        let info = encoder.probe(Path::new("/in/a.mp4")).await.unwrap();
        assert_eq!(info.duration_secs, Some(12.0));

        let out = encoder
            .encode_rendition(RenditionJob {
                job_id: "j".to_string(),
                input_path: PathBuf::from("/in/a.mp4"),
                tier: QualityTier::new("360p", 640, 360, 800_000),
                output_dir: PathBuf::from("/out/360p"),
                playlist_path: PathBuf::from("/out/360p/index.m3u8"),
                segment_pattern: PathBuf::from("/out/360p/%03d.ts"),
            })
            .await
            .unwrap();
        assert_eq!(out.label, "360p");
        assert_eq!(out.segment_count, 3);
    }
}

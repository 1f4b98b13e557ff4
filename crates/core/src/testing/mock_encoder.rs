//! Mock encoder for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::encoder::{
    AudioExtraction, EncoderError, FrameCapture, MediaEncoder, MediaInfo, RenditionJob,
    RenditionOutput,
};

/// Bytes written for a captured frame. Starts and ends with JPEG markers.
pub const MOCK_FRAME_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0mock-frame\xFF\xD9";

const MOCK_SEGMENTS: usize = 3;

/// Mock implementation of the MediaEncoder trait.
///
/// Provides controllable behavior for testing:
/// - Per-tier encode failures
/// - Probe, frame capture and audio extraction failures
/// - Configurable probe result
/// - Encode delay and concurrency tracking
///
/// Successful encodes write a real sub-manifest and `.ts` files so
/// manifest composition and file serving can be exercised end to end.
///
/// # Example
///
/// ```rust,ignore
/// use reelpipe_core::testing::MockEncoder;
///
/// let encoder = MockEncoder::new();
/// encoder.fail_label("1080p").await;
/// encoder.fail_frame_capture().await;
/// ```
#[derive(Debug)]
pub struct MockEncoder {
    failing_labels: Arc<RwLock<HashSet<String>>>,
    probe_result: Arc<RwLock<Option<MediaInfo>>>,
    probe_fails: Arc<RwLock<bool>>,
    frame_fails: Arc<RwLock<bool>>,
    audio_fails: Arc<RwLock<bool>>,
    encode_delay: Arc<RwLock<Option<Duration>>>,
    encoded: Arc<RwLock<Vec<RenditionJob>>>,
    captures: Arc<RwLock<Vec<FrameCapture>>>,
    inspections: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a new mock encoder where everything succeeds.
    pub fn new() -> Self {
        Self {
            failing_labels: Arc::new(RwLock::new(HashSet::new())),
            probe_result: Arc::new(RwLock::new(None)),
            probe_fails: Arc::new(RwLock::new(false)),
            frame_fails: Arc::new(RwLock::new(false)),
            audio_fails: Arc::new(RwLock::new(false)),
            encode_delay: Arc::new(RwLock::new(None)),
            encoded: Arc::new(RwLock::new(Vec::new())),
            captures: Arc::new(RwLock::new(Vec::new())),
            inspections: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Make encodes for this tier fail.
    pub async fn fail_label(&self, label: &str) {
        self.failing_labels.write().await.insert(label.to_string());
    }

    /// Make every probe fail.
    pub async fn fail_probe(&self) {
        *self.probe_fails.write().await = true;
    }

    /// Make every frame capture fail.
    pub async fn fail_frame_capture(&self) {
        *self.frame_fails.write().await = true;
    }

    /// Make every audio extraction fail.
    pub async fn fail_audio(&self) {
        *self.audio_fails.write().await = true;
    }

    /// Override the probe result.
    pub async fn set_probe_result(&self, info: MediaInfo) {
        *self.probe_result.write().await = Some(info);
    }

    /// Sleep this long inside every encode.
    pub async fn set_encode_delay(&self, delay: Duration) {
        *self.encode_delay.write().await = Some(delay);
    }

    /// Labels of every encode attempted, in start order.
    pub async fn encoded_labels(&self) -> Vec<String> {
        self.encoded
            .read()
            .await
            .iter()
            .map(|job| job.tier.label.clone())
            .collect()
    }

    /// Number of source inspections so far.
    pub fn inspection_count(&self) -> usize {
        self.inspections.load(Ordering::SeqCst)
    }

    /// Every frame capture requested.
    pub async fn captures(&self) -> Vec<FrameCapture> {
        self.captures.read().await.clone()
    }

    /// Highest number of encodes observed running at once.
    pub async fn max_concurrent_encodes(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Probe result used when none is configured.
    pub fn default_media_info(path: &Path) -> MediaInfo {
        MediaInfo {
            path: path.to_path_buf(),
            size_bytes: 10 * 1024 * 1024,
            duration_secs: Some(12.0),
            format: "mov".to_string(),
            video_codec: Some("h264".to_string()),
            video_bitrate: Some(4_000_000),
            video_width: Some(1920),
            video_height: Some(1080),
            video_fps: Some(30.0),
            audio_codec: Some("aac".to_string()),
        }
    }

    async fn write_rendition(job: &RenditionJob) -> std::io::Result<u64> {
        tokio::fs::create_dir_all(&job.output_dir).await?;
        let mut playlist = String::from(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-PLAYLIST-TYPE:VOD\n",
        );
        let mut bytes = 0;
        for i in 0..MOCK_SEGMENTS {
            let name = format!("{:03}.ts", i);
            let data = format!("segment {} of {}", i, job.tier.label);
            tokio::fs::write(job.output_dir.join(&name), data.as_bytes()).await?;
            bytes += data.len() as u64;
            playlist.push_str("#EXTINF:4.000000,\n");
            playlist.push_str(&name);
            playlist.push('\n');
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(&job.playlist_path, playlist.as_bytes()).await?;
        Ok(bytes + playlist.len() as u64)
    }
}

#[async_trait]
impl MediaEncoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
        self.inspections.fetch_add(1, Ordering::SeqCst);
        if *self.probe_fails.read().await {
            return Err(EncoderError::probe_failed("mock probe failure"));
        }
        if tokio::fs::metadata(path).await.is_err() {
            return Err(EncoderError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(self
            .probe_result
            .read()
            .await
            .clone()
            .unwrap_or_else(|| Self::default_media_info(path)))
    }

    async fn encode_rendition(&self, job: RenditionJob) -> Result<RenditionOutput, EncoderError> {
        self.encoded.write().await.push(job.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if let Some(delay) = *self.encode_delay.read().await {
            tokio::time::sleep(delay).await;
        }

        let fails = self.failing_labels.read().await.contains(&job.tier.label);
        let result = if fails {
            // Leave partial output behind, as a crashed encoder would.
            let _ = tokio::fs::create_dir_all(&job.output_dir).await;
            let _ = tokio::fs::write(job.output_dir.join("000.ts"), b"partial").await;
            Err(EncoderError::encode_failed(
                format!("mock failure for {}", job.tier.label),
                Some("Error while encoding".to_string()),
            ))
        } else {
            match Self::write_rendition(&job).await {
                Ok(bytes) => Ok(RenditionOutput {
                    label: job.tier.label.clone(),
                    playlist_path: job.playlist_path.clone(),
                    segment_count: MOCK_SEGMENTS,
                    output_size_bytes: bytes,
                    duration_ms: 1,
                }),
                Err(e) => Err(EncoderError::Io(e)),
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn capture_frame(&self, capture: FrameCapture) -> Result<PathBuf, EncoderError> {
        self.captures.write().await.push(capture.clone());

        if *self.frame_fails.read().await {
            return Err(EncoderError::encode_failed("mock frame capture failure", None));
        }
        if let Some(parent) = capture.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&capture.output_path, MOCK_FRAME_BYTES).await?;
        Ok(capture.output_path)
    }

    async fn extract_audio(&self, extraction: AudioExtraction) -> Result<PathBuf, EncoderError> {
        if *self.audio_fails.read().await {
            return Err(EncoderError::encode_failed("mock audio failure", None));
        }
        if let Some(parent) = extraction.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&extraction.output_path, b"RIFF\x00\x00\x00\x00WAVE").await?;
        Ok(extraction.output_path)
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        Ok(())
    }
}

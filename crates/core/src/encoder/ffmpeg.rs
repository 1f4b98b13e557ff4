//! FFmpeg-based encoder implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::EncoderConfig;
use super::error::EncoderError;
use super::traits::MediaEncoder;
use super::types::{AudioExtraction, FrameCapture, MediaInfo, RenditionJob, RenditionOutput};
use crate::ladder::AUDIO_KBPS;

/// FFmpeg-based encoder implementation.
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    /// Creates a new FFmpeg encoder with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Creates an encoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Builds ffmpeg arguments for one HLS rendition.
    fn build_rendition_args(&self, job: &RenditionJob) -> Vec<String> {
        let tier = &job.tier;
        let video_kbps = tier.video_kbps();

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ];

        // Video
        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-g".to_string(),
            self.config.gop_size.to_string(),
            "-sc_threshold".to_string(),
            "0".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", tier.width, tier.height),
            "-b:v".to_string(),
            format!("{}k", video_kbps),
            "-maxrate".to_string(),
            format!("{}k", video_kbps),
            "-bufsize".to_string(),
            format!("{}k", video_kbps * 2),
        ]);

        // Audio
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", AUDIO_KBPS),
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            self.config.audio_sample_rate.to_string(),
        ]);

        // HLS packaging
        args.extend([
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            self.config.segment_duration_secs.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_segment_filename".to_string(),
            job.segment_pattern.to_string_lossy().to_string(),
        ]);

        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);

        args.push(job.playlist_path.to_string_lossy().to_string());

        args
    }

    /// Builds ffmpeg arguments for a single-frame capture.
    fn build_frame_args(&self, capture: &FrameCapture) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", capture.seek_secs),
            "-i".to_string(),
            capture.input_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:-2", self.config.thumbnail_width),
            "-q:v".to_string(),
            "2".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            capture.output_path.to_string_lossy().to_string(),
        ]
    }

    /// Builds ffmpeg arguments for audio extraction.
    fn build_audio_args(&self, extraction: &AudioExtraction) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            extraction.input_path.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-ar".to_string(),
            extraction.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "wav".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            extraction.output_path.to_string_lossy().to_string(),
        ]
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, EncoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: Option<String>,
            duration: Option<String>,
            size: Option<String>,
            bit_rate: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EncoderError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0);

        let size_bytes = probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let format_name = probe
            .format
            .format_name
            .as_deref()
            .and_then(|f| f.split(',').next())
            .unwrap_or("unknown");

        // Stream bitrate is often absent for matroska; fall back to the container's.
        let video_bitrate = video_stream
            .and_then(|s| s.bit_rate.as_deref())
            .or(probe.format.bit_rate.as_deref())
            .and_then(|b| b.parse::<u64>().ok());

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            video_bitrate,
            video_width: video_stream.and_then(|s| s.width).filter(|w| *w > 0),
            video_height: video_stream.and_then(|s| s.height).filter(|h| *h > 0),
            video_fps: video_stream
                .and_then(|s| s.r_frame_rate.as_deref())
                .and_then(parse_frame_rate),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        })
    }

    /// Runs ffmpeg to completion, honoring the configured timeout.
    async fn run_ffmpeg(&self, args: &[String]) -> Result<(), EncoderError> {
        debug!(ffmpeg = %self.config.ffmpeg_path.display(), ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncoderError::encode_failed("ffmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let run = async {
            let mut error_output = String::new();
            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }
            }
            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        };

        let outcome = match self.config.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), run).await.ok(),
            None => Some(run.await),
        };

        match outcome {
            Some(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(EncoderError::encode_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
                Ok(())
            }
            Some(Err(e)) => Err(EncoderError::Io(e)),
            None => {
                let _ = child.kill().await;
                Err(EncoderError::Timeout {
                    timeout_secs: self.config.timeout_secs.unwrap_or_default(),
                })
            }
        }
    }

    async fn ensure_input(path: &Path) -> Result<(), EncoderError> {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(EncoderError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    async fn ensure_dir(dir: &Path) -> Result<(), EncoderError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|_| EncoderError::OutputDirectoryFailed {
                path: dir.to_path_buf(),
            })
    }

    async fn ensure_output(path: &Path) -> Result<u64, EncoderError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            _ => Err(EncoderError::NoOutput {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parses a frame rate like "24000/1001" or "30".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => rate.parse::<f32>().ok(),
    }
}

/// Counts `.ts` segments in a rendition directory and sums the directory size.
async fn scan_rendition_dir(dir: &Path) -> Result<(usize, u64), EncoderError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut segments = 0;
    let mut bytes = 0;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        bytes += meta.len();
        if entry.path().extension().is_some_and(|ext| ext == "ts") {
            segments += 1;
        }
    }
    Ok((segments, bytes))
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
        Self::ensure_input(path).await?;

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EncoderError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn encode_rendition(&self, job: RenditionJob) -> Result<RenditionOutput, EncoderError> {
        let start = Instant::now();

        Self::ensure_input(&job.input_path).await?;
        Self::ensure_dir(&job.output_dir).await?;

        let args = self.build_rendition_args(&job);
        self.run_ffmpeg(&args).await?;

        Self::ensure_output(&job.playlist_path).await?;
        let (segment_count, output_size_bytes) = scan_rendition_dir(&job.output_dir).await?;
        if segment_count == 0 {
            return Err(EncoderError::NoOutput {
                path: job.segment_pattern.clone(),
            });
        }

        Ok(RenditionOutput {
            label: job.tier.label,
            playlist_path: job.playlist_path,
            segment_count,
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn capture_frame(&self, capture: FrameCapture) -> Result<PathBuf, EncoderError> {
        Self::ensure_input(&capture.input_path).await?;
        if let Some(parent) = capture.output_path.parent() {
            Self::ensure_dir(parent).await?;
        }

        let args = self.build_frame_args(&capture);
        self.run_ffmpeg(&args).await?;

        Self::ensure_output(&capture.output_path).await?;
        Ok(capture.output_path)
    }

    async fn extract_audio(&self, extraction: AudioExtraction) -> Result<PathBuf, EncoderError> {
        Self::ensure_input(&extraction.input_path).await?;
        if let Some(parent) = extraction.output_path.parent() {
            Self::ensure_dir(parent).await?;
        }

        let args = self.build_audio_args(&extraction);
        self.run_ffmpeg(&args).await?;

        Self::ensure_output(&extraction.output_path).await?;
        Ok(extraction.output_path)
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        Ok(())
    }
}

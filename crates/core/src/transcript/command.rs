//! Transcriber backed by an external speech-to-text command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::parse::parse_transcript;
use super::{TranscriptError, Transcriber};
use crate::catalog::TranscriptSegment;
use crate::encoder::{AudioExtraction, MediaEncoder};
use crate::ingest::JobContext;

/// Placeholder in `args` replaced by the extracted WAV path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Sample rate speech models expect.
const SPEECH_SAMPLE_RATE: u32 = 16_000;

/// Configuration for transcript generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Whether uploads are transcribed at all.
    #[serde(default)]
    pub enabled: bool,

    /// Speech-to-text executable. Must print the transcript on stdout.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments. `{input}` is replaced by the WAV path; if absent, the path
    /// is appended.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_command() -> String {
    "whisper".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_command(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TranscriptConfig {
    /// Command arguments for the given audio file.
    pub fn build_args(&self, audio: &Path) -> Vec<String> {
        let input = audio.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(INPUT_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(INPUT_PLACEHOLDER, &input)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(input.into_owned());
        }
        args
    }
}

/// Extracts the audio track, runs the configured command on it and parses
/// whatever it prints.
pub struct CommandTranscriber {
    config: TranscriptConfig,
    encoder: Arc<dyn MediaEncoder>,
}

impl CommandTranscriber {
    pub fn new(config: TranscriptConfig, encoder: Arc<dyn MediaEncoder>) -> Self {
        Self { config, encoder }
    }

    async fn run_command(&self, audio: &Path) -> Result<String, TranscriptError> {
        let args = self.config.build_args(audio);
        debug!(command = %self.config.command, ?args, "Spawning transcriber");

        let output = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(Duration::from_secs(self.config.timeout_secs), output).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TranscriptError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(TranscriptError::CommandFailed {
                reason: format!("exited with code: {:?}", output.status.code()),
                stderr: if stderr.is_empty() { None } else { Some(stderr) },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    fn name(&self) -> &str {
        &self.config.command
    }

    async fn transcribe(
        &self,
        ctx: &JobContext,
    ) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let scratch = ctx.layout.audio_scratch_path();

        let audio = self
            .encoder
            .extract_audio(AudioExtraction {
                input_path: ctx.source.clone(),
                output_path: scratch.clone(),
                sample_rate: SPEECH_SAMPLE_RATE,
            })
            .await;

        let result = match audio {
            Ok(path) => self
                .run_command(&path)
                .await
                .and_then(|stdout| parse_transcript(&stdout)),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), error = %e, "Failed to remove scratch audio");
            }
        }

        if let Ok(segments) = &result {
            info!(job_id = %ctx.job_id, segments = segments.len(), "Transcript generated");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::JobId;
    use crate::layout::StorageLayout;
    use crate::testing::MockEncoder;
    use tempfile::TempDir;

    async fn context(dir: &TempDir) -> JobContext {
        let storage = StorageLayout::new(dir.path());
        let job_id = JobId::generate();
        let layout = storage.allocate_job(job_id.as_str()).await.unwrap();
        let source = dir.path().join("raw.mp4");
        tokio::fs::write(&source, b"raw").await.unwrap();
        JobContext {
            job_id,
            layout,
            source,
        }
    }

    #[test]
    fn test_build_args_placeholder() {
        let config = TranscriptConfig {
            args: vec!["--model".into(), "base".into(), "--file={input}".into()],
            ..Default::default()
        };
        let args = config.build_args(Path::new("/tmp/a.wav"));
        assert_eq!(args, vec!["--model", "base", "--file=/tmp/a.wav"]);
    }

    #[test]
    fn test_build_args_appends_input() {
        let config = TranscriptConfig {
            args: vec!["-j".into()],
            ..Default::default()
        };
        let args = config.build_args(Path::new("/tmp/a.wav"));
        assert_eq!(args, vec!["-j", "/tmp/a.wav"]);
    }

    #[test]
    fn test_config_defaults() {
        let config: TranscriptConfig = toml::from_str("").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.command, "whisper");
        assert_eq!(config.timeout_secs, 600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcribe_with_echo_command() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let config = TranscriptConfig {
            enabled: true,
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"echo '[{"start": 0.5, "text": "bonjour"}]'"#.to_string(),
                "{input}".to_string(),
            ],
            timeout_secs: 10,
        };
        let transcriber = CommandTranscriber::new(config, Arc::new(MockEncoder::new()));

        let segments = transcriber.transcribe(&ctx).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "bonjour");
        assert!(!ctx.layout.audio_scratch_path().exists());
    }

    #[tokio::test]
    async fn test_missing_command_fails_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let config = TranscriptConfig {
            enabled: true,
            command: "/nonexistent/speech-to-text".to_string(),
            ..Default::default()
        };
        let transcriber = CommandTranscriber::new(config, Arc::new(MockEncoder::new()));

        let result = transcriber.transcribe(&ctx).await;
        assert!(matches!(result, Err(TranscriptError::Io(_))));
        assert!(!ctx.layout.audio_scratch_path().exists());
    }

    #[tokio::test]
    async fn test_audio_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let encoder = Arc::new(MockEncoder::new());
        encoder.fail_audio().await;
        let transcriber = CommandTranscriber::new(TranscriptConfig::default(), encoder);

        let result = transcriber.transcribe(&ctx).await;
        assert!(matches!(result, Err(TranscriptError::Audio(_))));
    }
}

//! Mock transcriber for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::TranscriptSegment;
use crate::ingest::JobContext;
use crate::transcript::{TranscriptError, Transcriber};

/// Mock implementation of the Transcriber trait.
///
/// Returns the configured segments, or fails when told to.
#[derive(Debug, Default)]
pub struct MockTranscriber {
    /// Segments returned on success.
    segments: Arc<RwLock<Vec<TranscriptSegment>>>,
    /// Whether the next calls fail.
    fails: Arc<RwLock<bool>>,
    /// Job ids transcribed so far.
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcriber that always returns these segments.
    pub fn with_segments(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments: Arc::new(RwLock::new(segments)),
            ..Default::default()
        }
    }

    pub async fn set_fails(&self, fails: bool) {
        *self.fails.write().await = fails;
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(
        &self,
        ctx: &JobContext,
    ) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        self.calls.write().await.push(ctx.id().to_string());

        if *self.fails.read().await {
            return Err(TranscriptError::CommandFailed {
                reason: "mock transcriber failure".to_string(),
                stderr: None,
            });
        }

        let segments = self.segments.read().await.clone();
        if segments.is_empty() {
            return Err(TranscriptError::Empty);
        }
        Ok(segments)
    }
}

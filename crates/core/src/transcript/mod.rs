//! Speech-to-text transcripts.
//!
//! A transcriber is a best-effort collaborator: the coordinator runs it next
//! to the encoder pool and stores whatever it returns. Any error means the
//! record is saved without a transcript.

mod command;
mod parse;

pub use command::{CommandTranscriber, TranscriptConfig};
pub use parse::parse_transcript;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::TranscriptSegment;
use crate::encoder::EncoderError;
use crate::ingest::JobContext;

/// Errors while producing a transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Audio extraction failed: {0}")]
    Audio(#[from] EncoderError),

    #[error("Transcriber command failed: {reason}")]
    CommandFailed {
        reason: String,
        stderr: Option<String>,
    },

    #[error("Transcriber timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Transcriber produced no text")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces timed transcript segments for a job's raw source.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered segments for the source in `ctx`.
    async fn transcribe(&self, ctx: &JobContext)
        -> Result<Vec<TranscriptSegment>, TranscriptError>;
}

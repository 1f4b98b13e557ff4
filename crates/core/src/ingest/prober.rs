//! Metadata probing with documented defaults.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::error::ErrorClass;
use super::types::{Degradation, JobContext};
use crate::encoder::{MediaEncoder, MediaInfo};

const UNKNOWN: &str = "unknown";

/// Technical facts stored on the catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbedMetadata {
    pub duration_secs: f64,
    pub codec: String,
    /// Bits per second.
    pub bitrate: u64,
    /// `WxH`.
    pub resolution: String,
}

impl Default for ProbedMetadata {
    fn default() -> Self {
        Self {
            duration_secs: 0.0,
            codec: UNKNOWN.to_string(),
            bitrate: 0,
            resolution: UNKNOWN.to_string(),
        }
    }
}

impl ProbedMetadata {
    /// Fills what the probe could determine and names the fields it could not.
    pub fn from_media_info(info: &MediaInfo) -> (Self, Vec<&'static str>) {
        let mut metadata = Self::default();
        let mut missing = Vec::new();

        match info.duration_secs.filter(|d| d.is_finite() && *d >= 0.0) {
            Some(duration) => metadata.duration_secs = duration,
            None => missing.push("duration"),
        }
        match info.video_codec.as_deref().filter(|c| !c.is_empty()) {
            Some(codec) => metadata.codec = codec.to_string(),
            None => missing.push("codec"),
        }
        match info.video_bitrate {
            Some(bitrate) => metadata.bitrate = bitrate,
            None => missing.push("bitrate"),
        }
        match info.resolution() {
            Some(resolution) => metadata.resolution = resolution,
            None => missing.push("resolution"),
        }

        (metadata, missing)
    }
}

/// Outcome of probing; never fails.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub metadata: ProbedMetadata,
    pub degradation: Option<Degradation>,
}

pub struct MetadataProber {
    encoder: Arc<dyn MediaEncoder>,
}

impl MetadataProber {
    pub fn new(encoder: Arc<dyn MediaEncoder>) -> Self {
        Self { encoder }
    }

    pub async fn probe(&self, ctx: &JobContext) -> ProbeResult {
        match self.encoder.probe(&ctx.source).await {
            Ok(info) => {
                let (metadata, missing) = ProbedMetadata::from_media_info(&info);
                let degradation = if missing.is_empty() {
                    None
                } else {
                    warn!(job_id = %ctx.job_id, ?missing, "Probe left fields undetermined");
                    Some(Degradation::new(
                        ErrorClass::MetadataError,
                        format!("Could not determine {}", missing.join(", ")),
                    ))
                };
                ProbeResult {
                    metadata,
                    degradation,
                }
            }
            Err(e) => {
                warn!(job_id = %ctx.job_id, error = %e, "Probe failed, using defaults");
                ProbeResult {
                    metadata: ProbedMetadata::default(),
                    degradation: Some(Degradation::new(ErrorClass::MetadataError, e.to_string())),
                }
            }
        }
    }
}

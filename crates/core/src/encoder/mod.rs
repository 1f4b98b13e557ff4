//! Media encoder backend.
//!
//! Wraps the external tools that inspect a raw upload, package it into HLS
//! renditions, grab poster frames and pull out audio for transcription.
//!
//! # Example
//!
//! ```ignore
//! use reelpipe_core::encoder::{EncoderConfig, FfmpegEncoder, MediaEncoder};
//!
//! let encoder = FfmpegEncoder::new(EncoderConfig::default());
//! encoder.validate().await?;
//! let info = encoder.probe(Path::new("upload.mp4")).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::EncoderConfig;
pub use error::EncoderError;
pub use ffmpeg::FfmpegEncoder;
pub use traits::MediaEncoder;
pub use types::{AudioExtraction, FrameCapture, MediaInfo, RenditionJob, RenditionOutput};

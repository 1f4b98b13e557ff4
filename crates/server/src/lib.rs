//! HTTP surface of the video ingestion service.

pub mod api;
pub mod metrics;
pub mod state;

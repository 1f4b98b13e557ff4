//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion jobs (outcomes, durations, degradations)
//! - Rendition encodes (per tier)
//! - Maintenance tasks (orphan sweeper, trending scorer)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Ingestion
// =============================================================================

/// Ingest jobs finished, by outcome.
pub static INGEST_JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpipe_ingest_jobs_total", "Total ingest jobs finished"),
        &["outcome"], // "completed", or a fatal error class
    )
    .unwrap()
});

/// Ingest job duration in seconds.
pub static INGEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelpipe_ingest_duration_seconds",
            "Duration of ingest jobs from allocation to terminal event",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Jobs currently between allocation and terminal event.
pub static INGEST_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelpipe_ingest_active_jobs", "Ingest jobs in progress").unwrap()
});

/// Non-fatal problems, by class.
pub static INGEST_DEGRADATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpipe_ingest_degradations_total",
            "Non-fatal problems absorbed during ingestion",
        ),
        &["class"], // "encode_error", "thumbnail_error", "metadata_error", "transcript_error"
    )
    .unwrap()
});

// =============================================================================
// Renditions
// =============================================================================

/// Rendition encodes by tier and result.
pub static RENDITION_ENCODES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpipe_rendition_encodes_total", "Total rendition encodes"),
        &["label", "result"], // result: "success", "failure"
    )
    .unwrap()
});

/// Rendition encode duration in seconds.
pub static RENDITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelpipe_rendition_duration_seconds",
            "Duration of a single rendition encode",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["label"],
    )
    .unwrap()
});

// =============================================================================
// Maintenance
// =============================================================================

/// Orphaned artifacts removed by the sweeper, by kind.
pub static SWEEPER_REMOVALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpipe_sweeper_removals_total",
            "Orphaned artifacts removed",
        ),
        &["kind"], // "job_dir", "thumbnail", "scratch"
    )
    .unwrap()
});

/// Records in the catalog, refreshed by each trending pass.
pub static CATALOG_VIDEOS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelpipe_catalog_videos", "Records in the video catalog").unwrap()
});

/// Trending score recomputations.
pub static TRENDING_RUNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reelpipe_trending_runs_total", "Trending score passes completed").unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Ingestion
        Box::new(INGEST_JOBS_TOTAL.clone()),
        Box::new(INGEST_DURATION.clone()),
        Box::new(INGEST_ACTIVE.clone()),
        Box::new(INGEST_DEGRADATIONS.clone()),
        // Renditions
        Box::new(RENDITION_ENCODES.clone()),
        Box::new(RENDITION_DURATION.clone()),
        // Maintenance
        Box::new(SWEEPER_REMOVALS.clone()),
        Box::new(CATALOG_VIDEOS.clone()),
        Box::new(TRENDING_RUNS.clone()),
    ]
}

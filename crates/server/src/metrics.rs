//! Prometheus metrics for the HTTP surface.
//!
//! Server-side collectors live here; the pipeline's own collectors come from
//! `reelpipe_core::metrics` and are registered into the same registry.

use axum::{extract::State, http::header, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use std::sync::Arc;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelpipe_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0, 300.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpipe_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpipe_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelpipe_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Uploads accepted by the upload endpoint.
pub static UPLOADS_RECEIVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpipe_uploads_received_total",
        "Multipart uploads handed to the ingest coordinator",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpipe_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpipe_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpipe_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelpipe_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Encoder pool (collected dynamically)
// =============================================================================

pub static ENCODER_POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpipe_encoder_pool_active",
        "Rendition encodes holding a permit",
    )
    .unwrap()
});

pub static ENCODER_POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelpipe_encoder_pool_queued",
        "Rendition encodes waiting for a permit",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(UPLOADS_RECEIVED.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Encoder pool
    registry
        .register(Box::new(ENCODER_POOL_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(ENCODER_POOL_QUEUED.clone()))
        .unwrap();

    // Core metrics (ingestion, renditions, maintenance)
    for metric in reelpipe_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges that mirror live application state.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let pool = state.coordinator().status().await.pool;
    ENCODER_POOL_ACTIVE.set(pool.active_encodes as i64);
    ENCODER_POOL_QUEUED.set(pool.queued_encodes as i64);

    if let Ok(count) = state.catalog().count() {
        reelpipe_core::metrics::CATALOG_VIDEOS.set(count as i64);
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Job ids: 17 timestamp digits, a dash and a short suffix.
static JOB_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{17}-[0-9a-zA-Z]+").unwrap());

static SEGMENT_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+\.ts$").unwrap());

static STREAM_QUALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/api/v1/stream/\{folder\})/[^/]+/").unwrap());

static THUMBNAIL_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/api/v1/thumbnails)/[^/]+$").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = JOB_SEGMENT.replace_all(&result, "{folder}");
    let result = SEGMENT_FILE.replace_all(&result, "/{segment}.ts");
    let result = STREAM_QUALITY.replace_all(&result, "$1/{quality}/");
    let result = THUMBNAIL_FILE.replace_all(&result, "$1/{file}");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/videos/550e8400-e29b-41d4-a716-446655440000/watch";
        assert_eq!(normalize_path(path), "/api/v1/videos/{id}/watch");
    }

    #[test]
    fn test_normalize_path_stream_segment() {
        let path = "/api/v1/stream/20260118093011042-k3x9/720p/007.ts";
        assert_eq!(
            normalize_path(path),
            "/api/v1/stream/{folder}/{quality}/{segment}.ts"
        );
    }

    #[test]
    fn test_normalize_path_master_manifest() {
        let path = "/api/v1/stream/20260118093011042-k3x9/master.m3u8";
        assert_eq!(normalize_path(path), "/api/v1/stream/{folder}/master.m3u8");
    }

    #[test]
    fn test_normalize_path_thumbnail() {
        let path = "/api/v1/thumbnails/20260118093011042-k3x9.jpg";
        assert_eq!(normalize_path(path), "/api/v1/thumbnails/{file}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/videos/trending"), "/api/v1/videos/trending");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("reelpipe_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        reelpipe_core::metrics::INGEST_ACTIVE.set(0);
        reelpipe_core::metrics::TRENDING_RUNS.inc_by(0);
        WS_CONNECTIONS_ACTIVE.set(0);
        ENCODER_POOL_ACTIVE.set(0);

        let output = encode_metrics();
        assert!(output.contains("reelpipe_ingest_active_jobs"));
        assert!(output.contains("reelpipe_trending_runs_total"));
        assert!(output.contains("reelpipe_ws_connections_active"));
        assert!(output.contains("reelpipe_encoder_pool_active"));
    }
}

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{handlers, ingest, media, uploads, videos, ws};
use crate::metrics::metrics_handler;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Read-only endpoints players and dashboards hit without credentials
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/videos/trending", get(videos::trending))
        .route("/videos/{id}", get(videos::get_video))
        .route("/stream/{folder}/master.m3u8", get(media::master_manifest))
        .route("/stream/{folder}/{quality}/{file}", get(media::rendition_file))
        .route("/thumbnails/{file}", get(media::thumbnail))
        .route("/ws", get(ws::ws_handler));

    let protected_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/ingest/status", get(ingest::get_status))
        .route(
            "/videos",
            get(videos::list_videos)
                .post(uploads::upload_video)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/videos/{id}/watch", post(videos::record_view))
        .route("/videos/{id}/reaction", post(videos::set_reaction))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = public_routes.merge(protected_routes).with_state(state.clone());

    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

//! Ingest coordinator status.

use axum::{extract::State, Json};
use reelpipe_core::{CoordinatorStatus, QualityTier};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IngestStatusResponse {
    #[serde(flatten)]
    pub status: CoordinatorStatus,
    /// Tiers every upload is encoded into.
    pub ladder: Vec<QualityTier>,
}

/// GET /api/v1/ingest/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<IngestStatusResponse> {
    let coordinator = state.coordinator();
    Json(IngestStatusResponse {
        status: coordinator.status().await,
        ladder: coordinator.ladder().to_vec(),
    })
}

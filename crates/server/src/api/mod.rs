pub mod handlers;
pub mod ingest;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod uploads;
pub mod videos;
pub mod ws;

use axum::{http::StatusCode, Json};
use reelpipe_core::CatalogError;
use serde::Serialize;

pub use routes::create_router;
pub use ws::{WsBroadcaster, WsMessage};

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

impl From<CatalogError> for ErrorResponse {
    fn from(e: CatalogError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

pub(crate) fn catalog_error(e: CatalogError) -> ApiError {
    let status = match e {
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(e.into()))
}

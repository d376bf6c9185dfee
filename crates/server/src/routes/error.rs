//! Mapping of engine errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gemma_core::GemmaError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] GemmaError),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    r#type: &'static str,
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Engine(GemmaError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
            ApiError::Engine(GemmaError::InvalidState) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable_error")
            }
            ApiError::Engine(_) | ApiError::Join(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (
            status,
            Json(ErrorBody {
                error: ErrorDetail {
                    message: self.to_string(),
                    r#type: error_type,
                },
            }),
        )
            .into_response()
    }
}

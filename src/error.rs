//! Service error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::fetch::FetchError;
use crate::sync::InvalidDurationError;
use crate::toolchain::ToolchainError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidDuration(#[from] InvalidDurationError),
    #[error(transparent)]
    Download(#[from] FetchError),
    #[error("media toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error body shape shared by all failure responses.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            // Malformed or unfetchable input cannot be fixed by retrying.
            ServiceError::InvalidDuration(_)
            | ServiceError::Download(_)
            | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Toolchain(_) | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%self, "Request failed");
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

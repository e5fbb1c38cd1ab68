use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispenser_contracts::{ErrorBody, ErrorResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported locator: {0}")]
    InvalidLocator(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote answered with status {0}")]
    Status(u16),
    #[error("document exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("document is not valid utf-8: {0}")]
    Decode(String),
}

/// Failures that abort an operation instead of producing an outcome.
#[derive(Debug, Error)]
pub enum DispenserError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DispenserError {
    pub fn code(&self) -> &'static str {
        match self {
            DispenserError::Store(_) => "store_unavailable",
            DispenserError::InvalidRequest(_) => "validation_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispenserError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispenserError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for DispenserError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

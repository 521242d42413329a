use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay failures that are answered by the relay itself
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing API Key")]
    MissingApiKey,

    #[error("Missing model parameter")]
    MissingModel,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The upstream could not be reached or its reply could not be read
    #[error("{0}")]
    Upstream(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingApiKey => StatusCode::UNAUTHORIZED,
            Self::MissingModel | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

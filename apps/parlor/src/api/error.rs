//! # API Errors
//!
//! Maps engine errors onto HTTP status codes. Every error body has the
//! same shape: `{"error": "...", "suggestions": [...]}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parlor_core::ParlorError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type of every handler.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request failed validation before reaching the engines.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Core(#[from] ParlorError),
}

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ApiError {
    /// The status code this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Core(e) => match e {
                ParlorError::DuplicateEmail => StatusCode::CONFLICT,
                ParlorError::InvalidCredentials | ParlorError::Unauthorized => {
                    StatusCode::UNAUTHORIZED
                }
                ParlorError::NotFound(_) => StatusCode::NOT_FOUND,
                ParlorError::EmptyContent | ParlorError::ContentRejected { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ParlorError::SerializationError(_) | ParlorError::IoError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let suggestions = match &self {
            Self::Core(ParlorError::ContentRejected { suggestions }) => suggestions.clone(),
            _ => Vec::new(),
        };
        let body = ErrorResponse {
            error: self.to_string(),
            suggestions,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::from(ParlorError::DuplicateEmail), StatusCode::CONFLICT),
            (ApiError::from(ParlorError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(ParlorError::Unauthorized), StatusCode::UNAUTHORIZED),
            (ApiError::from(ParlorError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (ApiError::from(ParlorError::EmptyContent), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ApiError::from(ParlorError::IoError("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::InvalidRequest("long".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status);
        }
    }
}

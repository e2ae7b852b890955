use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::DomainError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Domain failure rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::InvalidConfiguration(_) | DomainError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::IndexNotBuilt | DomainError::NotReady(_) => StatusCode::CONFLICT,
            DomainError::IncompatibleIndex(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DomainError::EmbeddingUnavailable(_) | DomainError::GenerationUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            DomainError::Storage(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, kind = self.0.kind(), "request failed");
        }

        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use gymhub_core::DomainError;
use gymhub_infra::ServiceError;

/// Handler error: a [`ServiceError`] rendered with a stable status and code.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

pub type ApiResult = Result<Response, ApiError>;

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self(value.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self(ServiceError::validation(value.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        service_error_to_response(self.0)
    }
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::NotFound(entity) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found")),
        ServiceError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::BAD_REQUEST, "conflict", msg),
        ServiceError::InvalidState(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_state", msg),
        ServiceError::InvalidTarget(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_target", msg),
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "concurrency_conflict", msg),
        ServiceError::Internal(detail) => {
            tracing::error!(error = %detail, "internal error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

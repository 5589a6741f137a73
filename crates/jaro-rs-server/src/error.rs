//! Mapping of engine errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jaro_rs_core::{CoreError, ErrorKind};
use serde_json::json;

/// Error body returned by every endpoint: `{"error": ..., "details": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str, details: impl Into<String>) -> Self {
        Self {
            status,
            error,
            details: details.into(),
        }
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not found", details)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let (status, error) = match err.kind() {
            ErrorKind::InvalidArgument => (StatusCode::BAD_REQUEST, "invalid request"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not found"),
            ErrorKind::FailedPrecondition => (StatusCode::CONFLICT, "invalid task state"),
            ErrorKind::Canceled => (StatusCode::REQUEST_TIMEOUT, "request canceled"),
            ErrorKind::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "service unavailable"),
            ErrorKind::NoViablePlan => (StatusCode::UNPROCESSABLE_ENTITY, "no viable plan"),
            ErrorKind::Fatal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };
        Self::new(status, error, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({"error": self.error, "details": self.details}));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use jaro_rs_core::CoreError;
    use pretty_assertions::assert_eq;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (CoreError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::FailedPrecondition("x".into()), StatusCode::CONFLICT),
            (CoreError::Canceled("x".into()), StatusCode::REQUEST_TIMEOUT),
            (CoreError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::NoViablePlan("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Fatal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}

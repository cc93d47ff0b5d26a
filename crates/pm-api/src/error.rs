//! API error handling
//!
//! All `PmError` values cross the HTTP boundary here and nowhere else. The
//! response body is a stable JSON shape clients can dispatch on:
//!
//! ```json
//! {"status":"error","message":"...","errorCode":"...","timestamp":"..."}
//! ```
//!
//! Internal errors (database, configuration) are reported as a generic 500
//! unless the expose-internal-errors toggle is on; the toggle exists for
//! development and defaults to off.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use pm_core::PmError;
use serde::Serialize;
use tracing::error;

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Enable or disable internal error detail in 500 responses. Called once at
/// startup from configuration.
pub fn set_expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

/// A `PmError` on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub PmError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<PmError> for ApiError {
    fn from(err: PmError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(rename = "errorCode")]
    error_code: &'static str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if err.is_client_safe() || EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
            err.to_string()
        } else {
            error!(error = %err, "internal error while handling request");
            "An unexpected error occurred".to_string()
        };

        let errors = match &err {
            PmError::Validation(validation) if !validation.errors.is_empty() => {
                Some(validation.errors.clone())
            }
            _ => None,
        };

        let body = ErrorBody {
            status: "error",
            message,
            error_code: err.error_code(),
            timestamp: Utc::now(),
            errors,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_core::ValidationErrors;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_client_safe_error_keeps_message() {
        let response = ApiError(PmError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["errorCode"], "INVALID_CREDENTIALS");
        assert_eq!(body["message"], "Invalid email or password");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_internal_detail_is_masked() {
        let response =
            ApiError(PmError::Database("connection refused to 10.0.0.1".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["errorCode"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "An unexpected error occurred");
    }

    #[tokio::test]
    async fn test_validation_error_carries_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("password", "must be at least 8 characters");
        let response = ApiError(PmError::Validation(errors)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
        assert_eq!(
            body["errors"]["password"][0],
            "must be at least 8 characters"
        );
    }
}

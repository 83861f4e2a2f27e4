//! Error types and handling for the MindVideo proxy server.
//!
//! This module provides a unified error type [`AppError`] that wraps various error sources
//! and implements proper HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error `type` reported for client-side problems.
pub const ERROR_TYPE_INVALID_REQUEST: &str = "invalid_request_error";
/// Error `type` reported for authentication problems.
pub const ERROR_TYPE_AUTHENTICATION: &str = "authentication_error";
/// Error `type` reported when the upstream service misbehaves.
pub const ERROR_TYPE_UPSTREAM: &str = "upstream_error";
/// Error `type` reported for everything else.
pub const ERROR_TYPE_API: &str = "api_error";

/// Main error type for the application.
///
/// All errors in the application should be converted to this type for consistent handling.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed bearer credential
    #[error("Unauthorized")]
    Unauthorized,

    /// Credential present but not accepted
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Client provided invalid data
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The upstream rejected or failed to accept a job submission
    #[error("Upstream submission failed: {0}")]
    UpstreamSubmission(String),

    /// The upstream task failed or did not finish within the polling budget
    #[error("Upstream task failed: {0}")]
    UpstreamTask(String),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamSubmission(_) | AppError::UpstreamTask(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => ERROR_TYPE_INVALID_REQUEST,
            AppError::Unauthorized | AppError::Forbidden(_) => ERROR_TYPE_AUTHENTICATION,
            AppError::UpstreamSubmission(_) | AppError::UpstreamTask(_) => ERROR_TYPE_UPSTREAM,
            _ => ERROR_TYPE_API,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        let message = match &self {
            AppError::Unauthorized => "Bearer token authentication required".to_string(),
            AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = AppError::Unauthorized;
        assert_eq!(err.to_string(), "Unauthorized");

        let err = AppError::Internal("test error".to_string());
        assert_eq!(err.to_string(), "Internal server error: test error");

        let err = AppError::UpstreamTask("content policy violation".to_string());
        assert_eq!(
            err.to_string(),
            "Upstream task failed: content policy violation"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UpstreamSubmission("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::UpstreamTask("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Config(anyhow::anyhow!("x")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let response = AppError::BadRequest("Parameter 'prompt' is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Parameter 'prompt' is required");
        assert_eq!(body["error"]["type"], ERROR_TYPE_INVALID_REQUEST);
        assert_eq!(body["error"]["code"], 400);
    }

    #[tokio::test]
    async fn test_upstream_body_keeps_upstream_message() {
        let response = AppError::UpstreamSubmission("quota exceeded".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(
            body["error"]["message"],
            "Upstream submission failed: quota exceeded"
        );
        assert_eq!(body["error"]["type"], ERROR_TYPE_UPSTREAM);
    }

    #[test]
    fn test_error_from_anyhow() {
        let app_err: AppError = anyhow::anyhow!("test error").into();
        assert!(matches!(app_err, AppError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Serialization(_)));
    }
}

//! Caller authentication against the master API key.
//!
//! Callers present `Authorization: Bearer <key>`. The scheme is matched
//! case-insensitively and the key is the last space-separated segment of the
//! header. When no master key is configured every request is let through.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::handlers::AppState;
use crate::core::error::{AppError, Result};

/// Extract the bearer token from the `Authorization` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?.trim();
    if !value.to_ascii_lowercase().contains("bearer") {
        return None;
    }
    value
        .split(' ')
        .last()
        .filter(|token| !token.is_empty() && !token.eq_ignore_ascii_case("bearer"))
}

/// Check the request headers against `master_key`.
///
/// * `Ok(())` - key matches, or no key is configured
/// * `Err(AppError::Unauthorized)` - header missing or not a bearer credential
/// * `Err(AppError::Forbidden)` - bearer present but wrong
pub fn verify_auth(headers: &HeaderMap, master_key: Option<&str>) -> Result<()> {
    let Some(master_key) = master_key else {
        return Ok(());
    };

    let token = extract_bearer(headers).ok_or(AppError::Unauthorized)?;
    if token != master_key {
        tracing::warn!("Rejected request with invalid API key");
        return Err(AppError::Forbidden("Invalid API key".to_string()));
    }
    Ok(())
}

/// Middleware guarding the `/v1` routes.
pub async fn require_master_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match verify_auth(request.headers(), state.config.effective_master_key()) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer sk-1")), Some("sk-1"));
        assert_eq!(extract_bearer(&headers("bearer sk-1")), Some("sk-1"));
        assert_eq!(extract_bearer(&headers("BEARER  sk-1")), Some("sk-1"));
        assert_eq!(extract_bearer(&headers("Basic abc")), None);
        assert_eq!(extract_bearer(&headers("Bearer")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn test_no_master_key_allows_everything() {
        assert!(verify_auth(&HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        assert_matches!(
            verify_auth(&HeaderMap::new(), Some("secret")),
            Err(AppError::Unauthorized)
        );
        assert_matches!(
            verify_auth(&headers("Token secret"), Some("secret")),
            Err(AppError::Unauthorized)
        );
    }

    #[test]
    fn test_wrong_key_is_forbidden() {
        assert_matches!(
            verify_auth(&headers("Bearer nope"), Some("secret")),
            Err(AppError::Forbidden(_))
        );
    }

    #[test]
    fn test_matching_key_passes() {
        assert!(verify_auth(&headers("Bearer secret"), Some("secret")).is_ok());
        assert!(verify_auth(&headers("bearer secret"), Some("secret")).is_ok());
    }
}

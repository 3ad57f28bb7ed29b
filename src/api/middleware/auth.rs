//! Shared-secret bearer authentication

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::api::server::AppState;
use crate::error::HunterError;

/// Checks `Authorization: Bearer <secret>` against the configured secret
#[derive(Clone)]
pub struct SharedSecretAuth {
    secret: Arc<str>,
}

impl SharedSecretAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    /// Extract token from Authorization header
    pub fn extract_token(authorization: &str) -> Option<&str> {
        authorization
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Compare without short-circuiting on the first differing byte
    pub fn verify(&self, token: &str) -> bool {
        let expected = self.secret.as_bytes();
        let given = token.as_bytes();

        if expected.is_empty() || expected.len() != given.len() {
            return false;
        }

        expected
            .iter()
            .zip(given)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), HunterError> {
        let authorization = authorization.ok_or(HunterError::MissingAuthHeader)?;
        let token = Self::extract_token(authorization).ok_or(HunterError::InvalidAuthHeader)?;

        if self.verify(token) {
            Ok(())
        } else {
            Err(HunterError::AuthenticationFailed)
        }
    }
}

/// Reject requests that do not carry the shared secret
pub async fn require_bearer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, HunterError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.auth.authorize(authorization) {
        debug!(path = %req.uri().path(), "Rejected request: {}", e);
        return Err(e);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token() {
        assert_eq!(SharedSecretAuth::extract_token("Bearer abc"), Some("abc"));
        assert_eq!(SharedSecretAuth::extract_token("Basic abc"), None);
        assert_eq!(SharedSecretAuth::extract_token("Bearer "), None);
    }

    #[test]
    fn test_authorize() {
        let auth = SharedSecretAuth::new("s3cret");

        assert!(auth.authorize(Some("Bearer s3cret")).is_ok());
        assert!(matches!(
            auth.authorize(None),
            Err(HunterError::MissingAuthHeader)
        ));
        assert!(matches!(
            auth.authorize(Some("Token s3cret")),
            Err(HunterError::InvalidAuthHeader)
        ));
        assert!(matches!(
            auth.authorize(Some("Bearer s3cre")),
            Err(HunterError::AuthenticationFailed)
        ));
        assert!(matches!(
            auth.authorize(Some("Bearer s3creT")),
            Err(HunterError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_empty_secret_never_matches() {
        let auth = SharedSecretAuth::new("");
        assert!(!auth.verify(""));
    }
}

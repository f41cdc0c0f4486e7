//! Bearer-token authentication helpers.
//!
//! HTTP routes read the `Authorization: Bearer <token>` header; the
//! WebSocket upgrade passes the raw token from its query string. Both end
//! up in [`authenticate_token`].

use axum::http::HeaderMap;

use crate::backend::auth::verify_token;
use crate::backend::error::BackendError;

/// Identity established from a verified token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
}

/// Verify a raw JWT and produce the caller's identity.
pub fn authenticate_token(token: &str, secret: &str) -> Result<AuthenticatedUser, BackendError> {
    let claims = verify_token(token, secret).map_err(|e| {
        tracing::warn!("[Auth] Invalid token: {}", e);
        BackendError::auth("Invalid or expired token")
    })?;
    Ok(AuthenticatedUser {
        user_id: claims.sub,
        email: claims.email,
    })
}

/// Verify the `Authorization: Bearer <token>` header.
pub fn authenticate_bearer(
    headers: &HeaderMap,
    secret: &str,
) -> Result<AuthenticatedUser, BackendError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| BackendError::auth("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| BackendError::auth("Invalid authorization header format"))?;

    authenticate_token(token, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::create_token;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_bearer_round_trip() {
        let token = create_token("alice", "alice@example.com", SECRET).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {}", token).parse().unwrap());

        let user = authenticate_bearer(&headers, SECRET).unwrap();
        assert_eq!(user.user_id, "alice");
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_missing_header_is_auth_error() {
        let headers = HeaderMap::new();
        let result = authenticate_bearer(&headers, SECRET);
        assert!(matches!(result, Err(BackendError::Auth { .. })));
    }

    #[test]
    fn test_non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        let result = authenticate_bearer(&headers, SECRET);
        assert!(matches!(result, Err(BackendError::Auth { .. })));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let token = create_token("alice", "alice@example.com", "other-secret").unwrap();
        let result = authenticate_token(&token, SECRET);
        assert!(matches!(result, Err(BackendError::Auth { .. })));
    }
}

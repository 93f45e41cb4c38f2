// ==============================================================================
// middleware/auth.rs - Bearer Token Auth Gate
// ==============================================================================
// Description: Parse the Authorization header and verify the bearer token
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// Security: Only runs for routes flagged `auth_required`. Every request is
// verified against the identity provider; nothing is cached. The token itself
// is never logged.
//
// ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use tracing::{debug, error, warn};

use crate::error::AuthError;
use crate::identity::{IdentityProvider, SubjectId, VerificationError};

/// Raw `Authorization` header value, if present.
///
/// A header that is not visible ASCII cannot carry a bearer token and is
/// treated as malformed.
pub fn credential_header(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    match headers.get(header::AUTHORIZATION) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AuthError::MalformedCredential),
    }
}

/// Extract the token from `Bearer <token>`.
///
/// Exactly two space-separated parts are accepted, the first literally
/// `Bearer`; `"Bearer  x"` (double space) is malformed.
pub fn parse_bearer(credential_header: Option<&str>) -> Result<&str, AuthError> {
    let value = match credential_header {
        None | Some("") => return Err(AuthError::MissingCredential),
        Some(value) => value,
    };

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}

/// Auth Gate: bearer parsing plus a bounded call to the identity provider
#[derive(Clone)]
pub struct AuthGate {
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn authenticate(
        &self,
        credential_header: Option<&str>,
    ) -> Result<SubjectId, AuthError> {
        let token = parse_bearer(credential_header)?;

        let verification = tokio::time::timeout(self.timeout, self.provider.verify(token)).await;

        match verification {
            Ok(Ok(subject)) => {
                debug!("Token verified for subject {}", subject);
                Ok(subject)
            }
            Ok(Err(VerificationError::Rejected(reason))) => {
                warn!("Token rejected by identity provider: {}", reason);
                Err(AuthError::InvalidToken)
            }
            Ok(Err(VerificationError::Unavailable(reason))) => {
                error!("Identity provider unavailable: {}", reason);
                Err(AuthError::InvalidToken)
            }
            Err(_) => {
                error!("Identity provider timed out after {:?}", self.timeout);
                Err(AuthError::InvalidToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentityProvider;
    use async_trait::async_trait;
    use axum::http::Request;

    fn gate() -> AuthGate {
        let idp = StaticIdentityProvider::new().with_token("valid-token", "user-7");
        AuthGate::new(Arc::new(idp), Duration::from_secs(1))
    }

    struct SlowProvider;

    #[async_trait]
    impl IdentityProvider for SlowProvider {
        async fn verify(&self, _token: &str) -> Result<SubjectId, VerificationError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(SubjectId::new("too-late"))
        }
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(parse_bearer(None), Err(AuthError::MissingCredential));
        assert_eq!(parse_bearer(Some("")), Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_parse_bearer_malformed() {
        for header in [
            "Bearer",
            "Bearer ",
            "bearer abc",
            "Basic dXNlcjpwYXNz",
            "Bearer a b",
            "Bearer  abc",
            "abc",
        ] {
            assert_eq!(
                parse_bearer(Some(header)),
                Err(AuthError::MalformedCredential),
                "header {:?}",
                header
            );
        }
    }

    #[test]
    fn test_credential_header_extraction() {
        let req = Request::builder()
            .header("Authorization", "Bearer t")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(credential_header(&parts.headers), Ok(Some("Bearer t")));

        let req = Request::builder().body(()).unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(credential_header(&parts.headers), Ok(None));
    }

    #[test]
    fn test_credential_header_non_ascii() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            axum::http::HeaderValue::from_bytes(b"Bearer \xff").unwrap(),
        );
        assert_eq!(
            credential_header(&headers),
            Err(AuthError::MalformedCredential)
        );
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let subject = gate().authenticate(Some("Bearer valid-token")).await.unwrap();
        assert_eq!(subject.as_str(), "user-7");
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let gate = gate();
        assert_eq!(
            gate.authenticate(None).await,
            Err(AuthError::MissingCredential)
        );
        assert_eq!(
            gate.authenticate(Some("Token valid-token")).await,
            Err(AuthError::MalformedCredential)
        );
        assert_eq!(
            gate.authenticate(Some("Bearer forged")).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_authenticate_times_out() {
        let gate = AuthGate::new(Arc::new(SlowProvider), Duration::from_millis(50));
        assert_eq!(
            gate.authenticate(Some("Bearer anything")).await,
            Err(AuthError::InvalidToken)
        );
    }
}

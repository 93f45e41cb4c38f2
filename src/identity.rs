// ==============================================================================
// identity.rs - Identity Provider Capability
// ==============================================================================
// Description: Token verification seam and its HTTP introspection client
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// The gateway never inspects token contents. A provider takes the raw bearer
// token and either returns the subject it belongs to or refuses it.
//
// ==============================================================================

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Verified subject identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum VerificationError {
    /// The provider looked at the token and refused it
    #[error("token rejected: {0}")]
    Rejected(String),

    /// The provider could not be asked (network, timeout, bad reply)
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// External capability that turns a bearer token into a subject
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<SubjectId, VerificationError>;

    /// Startup reachability check; providers without one are always ready
    async fn probe(&self) -> Result<(), VerificationError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct IntrospectionRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(alias = "uid", alias = "sub", alias = "user_id")]
    subject: String,
}

/// Token introspection over HTTP.
///
/// POSTs `{"token": "..."}` to the verify URL. A 2xx reply carrying
/// `{"subject": "..."}` (also accepted as `uid`, `sub` or `user_id`) verifies
/// the token; 400/401/403/404 reject it; anything else means the provider is
/// unavailable.
pub struct HttpIdentityProvider {
    client: Client,
    verify_url: String,
    health_url: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(
        verify_url: impl Into<String>,
        health_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
            health_url,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, token: &str) -> Result<SubjectId, VerificationError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&IntrospectionRequest { token })
            .send()
            .await
            .map_err(|e| VerificationError::Unavailable(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let body: IntrospectionResponse = response
                    .json()
                    .await
                    .map_err(|e| VerificationError::Unavailable(format!("bad reply: {}", e)))?;

                if body.subject.is_empty() {
                    return Err(VerificationError::Rejected("empty subject".to_string()));
                }
                Ok(SubjectId::new(body.subject))
            }
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND => {
                debug!("Identity provider refused token with {}", status);
                Err(VerificationError::Rejected(status.to_string()))
            }
            other => Err(VerificationError::Unavailable(format!(
                "unexpected status {}",
                other
            ))),
        }
    }

    async fn probe(&self) -> Result<(), VerificationError> {
        let Some(url) = &self.health_url else {
            return Ok(());
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VerificationError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerificationError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }

        info!("Identity provider reachable at {}", url);
        Ok(())
    }
}

/// Fixed token → subject map for local development and tests
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, SubjectId>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, subject: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), SubjectId::new(subject));
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<SubjectId, VerificationError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| VerificationError::Rejected("unknown token".to_string()))
    }
}

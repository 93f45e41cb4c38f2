// ==============================================================================
// state.rs - Application State Management
// ==============================================================================
// Description: Shared, read-only gateway state injected into every request
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::identity::{HttpIdentityProvider, IdentityProvider, StaticIdentityProvider};
use crate::middleware::AuthGate;
use crate::proxy::Forwarder;
use crate::routes::RouteTable;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Ordered route table, never mutated after startup
    routes: RouteTable,

    /// Bearer token verification
    auth_gate: AuthGate,

    /// Outbound transport and response relay
    forwarder: Forwarder,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(routes: RouteTable, auth_gate: AuthGate, forwarder: Forwarder) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                routes,
                auth_gate,
                forwarder,
            }),
        }
    }

    /// Build state from configuration, including the identity provider probe
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        let provider: Arc<dyn IdentityProvider> = match &config.identity {
            Some(identity) => {
                let provider = HttpIdentityProvider::new(
                    identity.verify_url.clone(),
                    identity.health_url.clone(),
                    config.identity_timeout,
                )
                .context("Failed to create identity provider client")?;

                // Unreachable identity provider at startup is fatal
                provider
                    .probe()
                    .await
                    .context("Identity provider health check failed")?;

                info!("Identity provider: {}", identity.verify_url);
                Arc::new(provider)
            }
            None => {
                // Config validation guarantees no route needs this
                warn!("No identity provider configured; every token will be refused");
                Arc::new(StaticIdentityProvider::new())
            }
        };

        let client = Forwarder::build_client(config.backend_connect_timeout)
            .context("Failed to create backend HTTP client")?;

        let forwarder = Forwarder::new(
            client,
            config.backend_response_timeout,
            config.subject_header.clone(),
        );

        Ok(Self::new(
            config.routes.clone(),
            AuthGate::new(provider, config.identity_timeout),
            forwarder,
        ))
    }

    /// Get route table
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// Get auth gate
    pub fn auth_gate(&self) -> &AuthGate {
        &self.inner.auth_gate
    }

    /// Get forwarder
    pub fn forwarder(&self) -> &Forwarder {
        &self.inner.forwarder
    }
}

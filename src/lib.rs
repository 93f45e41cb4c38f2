// ==============================================================================
// lib.rs - Token Gateway Library
// ==============================================================================
// Description: Token-gated reverse proxy: route table, auth gate, forwarder
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod router;
pub mod routes;
pub mod state;

pub use config::{ConfigError, GatewayConfig, LogFormat};
pub use error::{AuthError, GatewayError, ProxyError};
pub use identity::{IdentityProvider, SubjectId, VerificationError};
pub use router::build_router;
pub use state::AppState;

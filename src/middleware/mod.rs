// ==============================================================================
// middleware/mod.rs - Gateway Middleware Modules
// ==============================================================================
// Description: Authentication stage of the request pipeline
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod auth;

pub use auth::{credential_header, parse_bearer, AuthGate};

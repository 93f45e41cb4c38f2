// ==============================================================================
// config.rs - Gateway Configuration
// ==============================================================================
// Description: Environment-driven configuration and static route loading
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// All configuration is read once at startup. The route table it produces is
// immutable for the life of the process; there is no reload path.
//
// ==============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderName;
use serde::Deserialize;
use thiserror::Error;

use crate::proxy::DEFAULT_SUBJECT_HEADER;
use crate::routes::{Route, RouteTable};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_BACKEND_RESPONSE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid route target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("route table is empty")]
    EmptyRouteTable,

    #[error("failed to read routes file {path:?}: {source}")]
    RoutesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse route list: {0}")]
    RoutesJson(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("routes require authentication but IDENTITY_VERIFY_URL is not set")]
    MissingIdentityProvider,
}

/// One entry of the JSON route list
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub pattern: String,
    pub target: String,
    #[serde(default)]
    pub auth_required: bool,
}

impl RouteConfig {
    fn into_route(self) -> Result<Route, ConfigError> {
        Route::new(&self.pattern, &self.target, self.auth_required)
    }
}

/// Identity provider endpoints
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub verify_url: String,
    pub health_url: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    /// Read from `LOG_FORMAT`; unknown values fall back to compact
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub routes: RouteTable,
    pub identity: Option<IdentityConfig>,
    pub identity_timeout: Duration,
    pub backend_connect_timeout: Duration,
    pub backend_response_timeout: Duration,
    pub subject_header: HeaderName,
}

impl GatewayConfig {
    /// Load configuration from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_raw =
            lookup("GATEWAY_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "GATEWAY_LISTEN_ADDR",
            value: listen_raw.clone(),
        })?;

        let route_configs = if let Some(path) = lookup("GATEWAY_ROUTES_FILE") {
            let path = PathBuf::from(path);
            let raw = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::RoutesFile { path, source })?;
            serde_json::from_str::<Vec<RouteConfig>>(&raw)?
        } else if let Some(raw) = lookup("GATEWAY_ROUTES") {
            serde_json::from_str::<Vec<RouteConfig>>(&raw)?
        } else {
            default_routes()
        };

        let routes = RouteTable::new(
            route_configs
                .into_iter()
                .map(RouteConfig::into_route)
                .collect::<Result<Vec<_>, _>>()?,
        )?;

        let identity = lookup("IDENTITY_VERIFY_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|verify_url| IdentityConfig {
                verify_url,
                health_url: lookup("IDENTITY_HEALTH_URL").filter(|url| !url.trim().is_empty()),
            });

        if routes.requires_auth() && identity.is_none() {
            return Err(ConfigError::MissingIdentityProvider);
        }

        let subject_raw = lookup("GATEWAY_SUBJECT_HEADER")
            .unwrap_or_else(|| DEFAULT_SUBJECT_HEADER.to_string());
        let subject_header = HeaderName::try_from(subject_raw.to_ascii_lowercase()).map_err(|_| {
            ConfigError::InvalidValue {
                key: "GATEWAY_SUBJECT_HEADER",
                value: subject_raw.clone(),
            }
        })?;

        Ok(Self {
            listen_addr,
            routes,
            identity,
            identity_timeout: seconds(
                &lookup,
                "IDENTITY_TIMEOUT_SECS",
                DEFAULT_IDENTITY_TIMEOUT_SECS,
            )?,
            backend_connect_timeout: seconds(
                &lookup,
                "BACKEND_CONNECT_TIMEOUT_SECS",
                DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS,
            )?,
            backend_response_timeout: seconds(
                &lookup,
                "BACKEND_RESPONSE_TIMEOUT_SECS",
                DEFAULT_BACKEND_RESPONSE_TIMEOUT_SECS,
            )?,
            subject_header,
        })
    }
}

/// Positive whole-second duration, falling back to `default` when unset
fn seconds<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
    }
}

/// Route table used when none is configured
fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            pattern: "/service1/*".to_string(),
            target: "http://localhost:8081".to_string(),
            auth_required: true,
        },
        RouteConfig {
            pattern: "/service2/*".to_string(),
            target: "http://localhost:8082".to_string(),
            auth_required: false,
        },
    ]
}

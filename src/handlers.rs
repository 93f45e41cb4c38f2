// ==============================================================================
// handlers.rs - Gateway Request Handlers
// ==============================================================================
// Description: Catch-all proxy handler and the gateway's own health endpoint
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{info_span, warn, Instrument};

use crate::{
    context::{RequestContext, RequestPhase},
    error::{GatewayError, ProxyError},
    middleware::credential_header,
    models::HealthResponse,
    state::AppState,
};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        routes: state.routes().len(),
        timestamp: Utc::now(),
    })
}

/// Every request that is not for the gateway itself ends up here
pub async fn gateway(State(state): State<AppState>, request: Request) -> Response {
    let ctx = RequestContext::new();
    let span = info_span!(
        "gateway",
        request_id = %ctx.request_id(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        match run_pipeline(&state, ctx, request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Route lookup, optional authentication, then forwarding
async fn run_pipeline(
    state: &AppState,
    mut ctx: RequestContext,
    request: Request,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_string();

    let Some(route) = state.routes().find(&path) else {
        ctx.advance(RequestPhase::Failed);
        warn!("No route matched {}", path);
        return Err(ProxyError::NoRouteMatched { path }.into());
    };

    if route.auth_required() {
        ctx.advance(RequestPhase::Authenticating);

        // Owned copy so no borrow of the request is held across the await
        let credential = credential_header(request.headers()).map(|h| h.map(str::to_owned));

        let verified = match credential {
            Ok(header) => state.auth_gate().authenticate(header.as_deref()).await,
            Err(e) => Err(e),
        };

        match verified {
            Ok(subject) => ctx.set_subject(subject),
            Err(e) => {
                ctx.advance(RequestPhase::Rejected);
                warn!("Rejected request for {}: {}", route.pattern(), e);
                return Err(e.into());
            }
        }
    }

    ctx.advance(RequestPhase::Routed);

    let response = state.forwarder().forward(route, request, ctx).await?;
    Ok(response)
}

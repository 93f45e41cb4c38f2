// ==============================================================================
// proxy.rs - Forwarding Router
// ==============================================================================
// Description: Build the outbound request, dispatch it, stream the reply back
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// Bodies are never buffered in either direction. The inbound body is handed to
// reqwest as a stream and the backend body is handed to axum as a stream, so
// memory use per request is bounded by chunk size, not body size.
//
// Cancellation: the outbound future and the backend body stream are owned by
// the request task. When the caller goes away the task drops them and the
// backend connection is torn down with it.
//
// ==============================================================================

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
};
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, error, info, warn, Span};

use crate::context::{RequestContext, RequestPhase};
use crate::error::ProxyError;
use crate::routes::Route;

/// Default header carrying the verified subject to the backend
pub const DEFAULT_SUBJECT_HEADER: &str = "x-authenticated-subject";

/// Headers that describe a single connection rather than the message
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copy end-to-end headers, keeping every value of repeated headers.
///
/// Hop-by-hop headers and any header named in `Connection` are dropped.
pub fn copy_headers(source: &HeaderMap) -> HeaderMap {
    let connection_listed: Vec<String> = source
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut copied = HeaderMap::with_capacity(source.len());
    for (name, value) in source.iter() {
        if is_hop_by_hop(name) || connection_listed.iter().any(|n| n == name.as_str()) {
            continue;
        }
        copied.append(name.clone(), value.clone());
    }
    copied
}

/// Forwarding stage of the pipeline; cheap to clone, shares one connection pool
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    response_timeout: Duration,
    subject_header: HeaderName,
}

impl Forwarder {
    pub fn new(client: Client, response_timeout: Duration, subject_header: HeaderName) -> Self {
        Self {
            client,
            response_timeout,
            subject_header,
        }
    }

    /// Transport client for backend traffic.
    ///
    /// Redirects are relayed to the caller instead of followed, and proxy
    /// settings from the environment are ignored.
    pub fn build_client(connect_timeout: Duration) -> Result<Client, reqwest::Error> {
        Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
    }

    /// Outbound header set for a request; the subject header is only ever
    /// set by the gateway, never passed through from the caller
    fn outbound_headers(
        &self,
        inbound: &HeaderMap,
        ctx: &RequestContext,
    ) -> Result<HeaderMap, ProxyError> {
        let mut headers = copy_headers(inbound);
        headers.remove(header::HOST);
        headers.remove(&self.subject_header);

        if let Some(subject) = ctx.subject() {
            let value = HeaderValue::from_str(subject.as_str()).map_err(|_| {
                ProxyError::Internal(format!("subject {:?} is not a valid header value", subject))
            })?;
            headers.insert(self.subject_header.clone(), value);
        }

        Ok(headers)
    }

    /// Forward `request` to `route` and relay the backend response.
    ///
    /// Takes ownership of the request context; on success it travels with the
    /// response body and is closed out when the body finishes or is dropped.
    pub async fn forward(
        &self,
        route: &Route,
        request: Request,
        mut ctx: RequestContext,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();

        let path = parts.uri.path();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let Some(url) = route.resolve(path, path_and_query) else {
            ctx.advance(RequestPhase::Failed);
            warn!("Outbound URL for {} does not keep the matched path", path);
            return Err(ProxyError::NoRouteMatched {
                path: path.to_string(),
            });
        };
        let target = url.to_string();

        let headers = match self.outbound_headers(&parts.headers, &ctx) {
            Ok(headers) => headers,
            Err(e) => {
                ctx.advance(RequestPhase::Failed);
                return Err(e);
            }
        };

        ctx.advance(RequestPhase::Forwarding);
        debug!("Forwarding {} {}", parts.method, target);

        let mut outbound = self
            .client
            .request(parts.method.clone(), url)
            .headers(headers);

        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let sent = tokio::time::timeout(self.response_timeout, outbound.send()).await;

        let backend_response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                ctx.advance(RequestPhase::Failed);
                let err = classify_transport_error(&target, &e);
                error!("{}", err);
                return Err(err);
            }
            Err(_) => {
                ctx.advance(RequestPhase::Failed);
                let err = ProxyError::BackendUnreachable {
                    target,
                    reason: format!("no response within {:?}", self.response_timeout),
                };
                error!("{}", err);
                return Err(err);
            }
        };

        let status = backend_response.status();
        let response_headers = copy_headers(backend_response.headers());

        ctx.advance(RequestPhase::Relaying);
        info!(
            "{} {} -> {} ({})",
            parts.method,
            path_and_query,
            status,
            route.target_base()
        );

        let body = if has_no_body(&parts.method, status, backend_response.headers()) {
            ctx.advance(RequestPhase::Completed);
            Body::empty()
        } else {
            let relay = RelayBody::new(backend_response.bytes_stream().boxed(), ctx, target);
            Body::from_stream(relay)
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;

        Ok(response)
    }
}

/// Responses the caller will never read a body from. The server does not poll
/// the body of a HEAD reply, so relaying one would never finish.
fn has_no_body(method: &Method, status: StatusCode, headers: &HeaderMap) -> bool {
    *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || headers
            .get(header::CONTENT_LENGTH)
            .is_some_and(|v| v.as_bytes() == b"0")
}

/// Map a reqwest failure onto the proxy error taxonomy
fn classify_transport_error(target: &str, err: &reqwest::Error) -> ProxyError {
    if err.is_connect() || err.is_timeout() {
        ProxyError::BackendUnreachable {
            target: target.to_string(),
            reason: err.to_string(),
        }
    } else {
        ProxyError::BackendRequestFailed {
            target: target.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Backend body on its way to the caller.
///
/// Passes chunks through untouched and finishes the request lifecycle: the
/// context moves to `Completed` when the backend body ends, or to `Failed`
/// when the backend errors or the caller stops reading before the end.
pub struct RelayBody {
    inner: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    ctx: RequestContext,
    target: String,
    span: Span,
    bytes_relayed: u64,
    finished: bool,
}

impl RelayBody {
    fn new(
        inner: BoxStream<'static, Result<Bytes, reqwest::Error>>,
        ctx: RequestContext,
        target: String,
    ) -> Self {
        Self {
            inner,
            ctx,
            target,
            span: Span::current(),
            bytes_relayed: 0,
            finished: false,
        }
    }
}

impl Stream for RelayBody {
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let _entered = this.span.enter();

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_relayed += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                this.ctx.advance(RequestPhase::Failed);
                error!(
                    "Backend body from {} failed after {} bytes: {}",
                    this.target, this.bytes_relayed, e
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                this.ctx.advance(RequestPhase::Completed);
                debug!("Relayed {} bytes from {}", this.bytes_relayed, this.target);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl RelayBody {
    /// Caller stopped reading before the backend body ended
    fn abandon(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let _entered = self.span.enter();
        self.ctx.advance(RequestPhase::Failed);
        let err = ProxyError::ResponseWriteFailed {
            bytes_written: self.bytes_relayed,
        };
        warn!("{} (backend {}); closing connection", err, self.target);
    }
}

impl Drop for RelayBody {
    fn drop(&mut self) {
        self.abandon();
    }
}

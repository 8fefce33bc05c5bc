//! Access logging middleware.
//!
//! Emits one `accessed` event per request with latency, method, path,
//! query, caller address, final status and body bytes. The event is tied to
//! an [`AccessGuard`] so it fires exactly once whichever way the request
//! ends: body completed, body dropped, or the inner chain panicked before
//! a response existed (status 0).

use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::http::introspect::{CountingBody, ResponseOutcome};

/// Header carrying the caller's address, set by the fronting proxy.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Read the trusted caller address, if the fronting proxy set one.
pub fn real_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Request details captured before the handler runs.
#[derive(Debug, Clone)]
struct AccessEntry {
    method: String,
    path: String,
    query: String,
    ip: String,
}

impl AccessEntry {
    fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().unwrap_or_default().to_string(),
            ip: real_ip(req.headers()).unwrap_or_default().to_string(),
        }
    }
}

/// Emits the access event once, on [`AccessGuard::finish`] or on drop.
struct AccessGuard {
    start: Instant,
    entry: Option<AccessEntry>,
}

impl AccessGuard {
    fn new(entry: AccessEntry) -> Self {
        Self {
            start: Instant::now(),
            entry: Some(entry),
        }
    }

    fn finish(mut self, outcome: ResponseOutcome) {
        self.emit(outcome);
    }

    fn emit(&mut self, outcome: ResponseOutcome) {
        let Some(entry) = self.entry.take() else {
            return;
        };
        tracing::info!(
            latency = ?self.start.elapsed(),
            method = %entry.method,
            path = %entry.path,
            query = %entry.query,
            ip = %entry.ip,
            status = outcome.status_code(),
            bytes = outcome.bytes(),
            "accessed"
        );
    }
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        self.emit(ResponseOutcome::new());
    }
}

/// Tower layer that wraps services with access logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogLayer;

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

/// Tower service that logs every request it forwards.
#[derive(Debug, Clone)]
pub struct AccessLogService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for AccessLogService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        // Swap cloned service with the ready one (standard tower pattern)
        std::mem::swap(&mut self.inner, &mut inner);

        let guard = AccessGuard::new(AccessEntry::from_request(&request));

        Box::pin(async move {
            // If this future unwinds or is dropped here, the guard logs status 0.
            let response = inner.call(request).await?;

            let mut outcome = ResponseOutcome::new();
            outcome.record_status(response.status());

            let (parts, body) = response.into_parts();
            let body = CountingBody::new(body, outcome, move |outcome| guard.finish(outcome));
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

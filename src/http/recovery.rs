//! Panic recovery middleware.
//!
//! # Responsibilities
//! - Run the inner chain (and its response body) inside a protected scope
//! - Report handler panics at error level with a backtrace and request context
//! - Answer 500 with the panic message when no response was produced yet
//! - Leave committed responses alone; the body is cut short instead
//!
//! # Design Decisions
//! - Must be the outermost layer so it also covers the access log
//! - [`AbortHandler`] payloads are a deliberate abort, never reported
//! - The process panic hook captures the backtrace at the panic site;
//!   without it the backtrace is taken where the panic was caught

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Once};
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use http_body::{Frame, SizeHint};
use thiserror::Error;
use tower::{Layer, Service};

use crate::http::introspect::ResponseOutcome;

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Panic payload that aborts the current response without being reported.
///
/// Raise it with [`abort_handler`] when a handler decides the client is not
/// worth answering; the connection is dropped and nothing is logged.
#[derive(Debug, Clone, Copy)]
pub struct AbortHandler;

/// Abort the current request silently.
pub fn abort_handler() -> ! {
    panic::panic_any(AbortHandler)
}

/// Error ending a response body that could not be completed.
#[derive(Debug, Error)]
#[error("response aborted: {0}")]
pub struct ResponseAborted(String);

thread_local! {
    static RECOVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PANIC_REPORT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install the process panic hook used by recovery.
///
/// Inside a recovery scope the hook stores the panic location and backtrace
/// for the error log instead of printing them. Outside one it defers to the
/// previously installed hook. Calling this more than once has no effect.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RECOVERY_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            if info.payload().is::<AbortHandler>() {
                return;
            }
            let report = format!("{}\n{}", info, Backtrace::force_capture());
            PANIC_REPORT.with(|slot| *slot.borrow_mut() = Some(report));
        }));
    });
}

fn take_panic_report() -> Option<String> {
    PANIC_REPORT.with(|slot| slot.borrow_mut().take())
}

struct RecoveryScope;

impl RecoveryScope {
    fn enter() -> Self {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        RecoveryScope
    }
}

impl Drop for RecoveryScope {
    fn drop(&mut self) {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn protect<R>(f: impl FnOnce() -> R) -> Result<R, PanicPayload> {
    let _scope = RecoveryScope::enter();
    panic::catch_unwind(AssertUnwindSafe(f))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// What recovery decided to do about a caught panic.
#[derive(Debug, PartialEq, Eq)]
enum Recovery {
    /// Benign abort; nothing logged, connection dropped.
    Suppressed,
    /// Nothing was written yet; answer 500 with this message.
    Respond(String),
    /// A status is already on the wire; nothing more can be sent.
    Committed,
}

/// Request details kept for the panic report.
#[derive(Debug)]
struct FaultContext {
    method: String,
    path: String,
    query: String,
    peer: Option<SocketAddr>,
}

impl FaultContext {
    fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().unwrap_or_default().to_string(),
            peer: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    fn recover(&self, payload: &PanicPayload, outcome: &ResponseOutcome) -> Recovery {
        let payload: &(dyn Any + Send) = &**payload;
        if payload.is::<AbortHandler>() {
            return Recovery::Suppressed;
        }

        let message = panic_message(payload);
        let stack = take_panic_report().unwrap_or_else(|| Backtrace::force_capture().to_string());
        let ip = self.peer.map(|p| p.to_string()).unwrap_or_default();

        tracing::error!(
            error = %message,
            stack = %stack,
            method = %self.method,
            path = %self.path,
            query = %self.query,
            ip = %ip,
            status_written = outcome.is_status_written(),
            "panic!"
        );

        if outcome.is_status_written() {
            Recovery::Committed
        } else {
            Recovery::Respond(message)
        }
    }
}

fn fault_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{}\n", message),
    )
        .into_response()
}

fn aborted_response() -> Response {
    let body = Body::from_stream(futures_util::stream::once(async {
        Err::<Bytes, _>(ResponseAborted("handler aborted".to_string()))
    }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

/// Future adapter that turns a panic while polling into an `Err` payload.
struct CatchPanic<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = Result<F::Output, PanicPayload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner.as_mut();
        match protect(|| inner.poll(cx)) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

/// Response body polled inside the protected scope.
///
/// The head has already been handed to the connection when this body is
/// polled, so a panic here can only end the stream with an error.
struct RecoveringBody {
    inner: Body,
    context: Arc<FaultContext>,
    outcome: ResponseOutcome,
    faulted: bool,
}

impl HttpBody for RecoveringBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        if this.faulted {
            return Poll::Ready(None);
        }

        let inner = &mut this.inner;
        match protect(|| Pin::new(inner).poll_frame(cx)) {
            Ok(polled) => polled,
            Err(payload) => {
                this.faulted = true;
                let reason = match this.context.recover(&payload, &this.outcome) {
                    Recovery::Suppressed => "handler aborted",
                    _ => "handler panicked while streaming",
                };
                Poll::Ready(Some(Err(axum::Error::new(ResponseAborted(reason.to_string())))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.faulted || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Tower layer that wraps services with panic recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

/// Tower service that keeps a panicking request from taking the server down.
#[derive(Debug, Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RecoveryService<S>
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

        let context = Arc::new(FaultContext::from_request(&request));

        Box::pin(async move {
            let guarded = CatchPanic {
                inner: Box::pin(async move { inner.call(request).await }),
            };

            match guarded.await {
                Ok(Ok(response)) => {
                    let mut outcome = ResponseOutcome::new();
                    outcome.record_status(response.status());
                    let (parts, body) = response.into_parts();
                    let body = RecoveringBody {
                        inner: body,
                        context,
                        outcome,
                        faulted: false,
                    };
                    Ok(Response::from_parts(parts, Body::new(body)))
                }
                Ok(Err(err)) => Err(err),
                Err(payload) => Ok(match context.recover(&payload, &ResponseOutcome::new()) {
                    Recovery::Respond(message) => fault_response(message),
                    Recovery::Suppressed | Recovery::Committed => aborted_response(),
                }),
            }
        })
    }
}

//! Response introspection.
//!
//! Records the status and the number of body bytes a response carried,
//! without touching what is sent. The status is captured from the response
//! head; bytes are counted as the body streams out through [`CountingBody`].

use axum::body::{Body, Bytes, HttpBody};
use axum::http::StatusCode;
use http_body::{Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};

/// What the client was actually sent for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseOutcome {
    status: Option<StatusCode>,
    bytes: u64,
}

impl ResponseOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the response status.
    ///
    /// Only the first status is authoritative on the wire, so later calls
    /// are ignored. Returns whether this call was the one that recorded it.
    pub fn record_status(&mut self, status: StatusCode) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.status = Some(status);
        true
    }

    pub fn record_bytes(&mut self, n: usize) {
        self.bytes = self.bytes.saturating_add(n as u64);
    }

    /// The recorded status, if a response head has been produced.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Numeric status for logging; 0 when nothing was written.
    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }

    pub fn is_status_written(&self) -> bool {
        self.status.is_some()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

type Completion = Box<dyn FnOnce(ResponseOutcome) + Send>;

/// Body decorator that counts data bytes and reports once when done.
///
/// Frames and errors pass through untouched. The completion callback runs
/// exactly once: at end of stream, on the first body error, or when the
/// body is dropped unfinished (client went away, or it was never polled).
pub struct CountingBody {
    inner: Body,
    outcome: ResponseOutcome,
    on_complete: Option<Completion>,
}

impl CountingBody {
    pub fn new<F>(inner: Body, outcome: ResponseOutcome, on_complete: F) -> Self
    where
        F: FnOnce(ResponseOutcome) + Send + 'static,
    {
        Self {
            inner,
            outcome,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn finish(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(self.outcome);
        }
    }
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.outcome.record_bytes(data.len());
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.finish();
    }
}

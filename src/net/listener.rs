//! TCP listener with accept-error classification.
//!
//! # Responsibilities
//! - Bind to the configured port on all interfaces, IPv6 and IPv4
//! - Accept incoming TCP connections
//! - Ride out transient accept errors with backoff
//! - Surface anything else as fatal

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

use crate::resilience::Backoff;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(io::Error),
    /// Failed to accept connection, and retrying will not help.
    Accept(io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

/// Whether an accept error only affects one connection or is temporary.
///
/// Aborted handshakes and descriptor exhaustion clear up on their own;
/// the accept loop backs off and keeps going.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    // EMFILE / ENFILE: out of file descriptors, process- or system-wide.
    #[cfg(unix)]
    if matches!(err.raw_os_error(), Some(23) | Some(24)) {
        return true;
    }

    false
}

/// A TCP listener that only reports fatal accept errors.
pub struct Listener {
    inner: TcpListener,
    backoff: Backoff,
}

impl Listener {
    /// Bind to `port` on all interfaces.
    ///
    /// Tries the dual-stack `[::]` first and falls back to `0.0.0.0` on
    /// hosts without IPv6.
    pub async fn bind(port: u16) -> Result<Self, ListenerError> {
        let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
        let listener = match TcpListener::bind(v6).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::debug!(error = %e, "IPv6 bind failed; falling back to IPv4");
                let v4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
                TcpListener::bind(v4).await.map_err(ListenerError::Bind)?
            }
        };
        Ok(Self::from_tokio(listener))
    }

    /// Wrap an already bound listener.
    pub fn from_tokio(inner: TcpListener) -> Self {
        Self {
            inner,
            backoff: Backoff::new(Duration::from_millis(5), Duration::from_secs(1)),
        }
    }

    /// Accept the next connection.
    ///
    /// Transient errors are logged and retried after a backoff delay; only
    /// fatal errors are returned.
    pub async fn accept(&mut self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        loop {
            match self.inner.accept().await {
                Ok(conn) => {
                    self.backoff.reset();
                    return Ok(conn);
                }
                Err(e) if is_transient_accept_error(&e) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = self.backoff.failures(),
                        retry_in = ?delay,
                        "Accept failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(ListenerError::Accept(e)),
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }
}

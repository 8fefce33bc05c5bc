//! Open connection accounting.
//!
//! Each served connection holds an [`OpenConnection`] for its lifetime, so
//! draining can report how many connections it is still waiting on.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared count of connections currently being served.
#[derive(Debug, Clone, Default)]
pub struct ConnectionCounter {
    open: Arc<AtomicUsize>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The count drops again when the handle does.
    pub fn open(&self, peer: SocketAddr) -> OpenConnection {
        self.open.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(peer = %peer, "Connection opened");
        OpenConnection {
            open: Arc::clone(&self.open),
            peer,
        }
    }

    pub fn count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Handle kept alive by a connection task.
#[derive(Debug)]
pub struct OpenConnection {
    open: Arc<AtomicUsize>,
    peer: SocketAddr,
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(peer = %self.peer, "Connection closed");
    }
}

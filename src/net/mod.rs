//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, transient error backoff)
//!     → connection.rs (open connection accounting)
//!     → Hand off to HTTP layer (lifecycle::orchestrator)
//! ```
//!
//! # Design Decisions
//! - Only fatal accept errors leave the accept loop
//! - Each connection is counted until its task ends

pub mod connection;
pub mod listener;

pub use connection::{ConnectionCounter, OpenConnection};
pub use listener::{Listener, ListenerError};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transient accept error on the listener:
//!     → backoff.rs (exponential delay with jitter, capped)
//!     → accept loop sleeps, then tries again
//!     → first successful accept resets the backoff
//! ```
//!
//! # Design Decisions
//! - Upstream calls are never retried; the caller decides
//! - Jittered backoff prevents tight error loops

pub mod backoff;

pub use backoff::Backoff;

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields)
//!     → logging.rs dispatcher (EnvFilter → JSON formatter → stdout)
//!
//! Per request:
//!     → http::access_log emits one `accessed` event
//!     → http::recovery emits `panic!` events with a backtrace
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The dispatcher is passed explicitly, never installed globally

pub mod logging;

//! Upstream access-control API integration.
//!
//! # Data Flow
//! ```text
//! UpstreamConfig (token, host, org, timeout)
//!     → client.rs (authenticated calls, one shared reqwest::Client)
//!     → types.rs (envelope unwrapping, error classification)
//!     → patch.rs (absent / null / value rule fields)
//! ```
//!
//! # Error Classes
//! - Transport: unreachable, bad status, malformed envelope
//! - Rejection: envelope parsed and flagged `error`
//!
//! # Security Constraints
//! - The token is only ever placed in a sensitive header
//! - Never log the token

pub mod client;
pub mod patch;
pub mod types;

pub use client::UpstreamClient;
pub use patch::Patch;
pub use types::{AccessRule, Envelope, Resource, UpstreamError, UpstreamResult};

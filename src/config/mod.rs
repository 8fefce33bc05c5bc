//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (PORT, PANGOLIN_*)
//!     → loader.rs (presence & parsing)
//!     → validation.rs (semantic checks)
//!     → PortalConfig (validated, immutable)
//!     → ServerConfig to the orchestrator, UpstreamConfig to the client
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Missing required values are fatal before anything binds
//! - Validation separates parsing from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_from_env, ConfigError};
pub use schema::{PortalConfig, ServerConfig, UpstreamConfig, UpstreamCredentials};

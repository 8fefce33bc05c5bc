//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (lifecycle::orchestrator)
//!     → recovery.rs (panic containment, outermost)
//!     → access_log.rs (one event per request)
//!     → introspect.rs (status and byte capture)
//!     → server.rs router → handlers.rs
//!     → error.rs (plain-text failures)
//! ```

pub mod access_log;
pub mod error;
pub mod handlers;
pub mod introspect;
pub mod recovery;
pub mod server;

pub use error::AppError;
pub use server::{build_pipeline, build_router, AppState, Pipeline};

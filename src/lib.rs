//! Self-service portal library.
//!
//! Lets users allow their own address on resources of an upstream
//! access-control API. See `main.rs` for the process wiring.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::PortalConfig;
pub use http::{build_pipeline, build_router, AppState};
pub use lifecycle::{ServeError, Server, Shutdown};
pub use upstream::UpstreamClient;

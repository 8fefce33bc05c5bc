//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build client and pipeline → Bind listener
//!
//! Serving (orchestrator.rs):
//!     Accept loop ⟷ signal race → Drain (bounded) → Trigger shutdown.rs
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Begin draining
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, release
//! - Shutdown has a deadline; running past it is an error, not a hang

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use orchestrator::{ServeError, Server};
pub use shutdown::Shutdown;
pub use state::LifecycleState;

//! Self-service portal.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                SELFSERVICE PORTAL             │
//!                       │                                               │
//!   Client Request      │  ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//!   ────────────────────┼─▶│ recovery │──▶│ access log │──▶│ router  │  │
//!                       │  └──────────┘   └────────────┘   └────┬────┘  │
//!                       │                                       │       │
//!                       │                                       ▼       │
//!                       │                               ┌──────────────┐│
//!                       │                               │   upstream   ││──▶ Access-control
//!                       │                               │    client    ││    API
//!                       │                               └──────────────┘│
//!                       │                                               │
//!                       │  lifecycle: accept loop, signals, bounded drain│
//!                       └───────────────────────────────────────────────┘
//! ```
//!
//! Exits 0 after a clean drain, 1 on any startup, serve or shutdown error.

use std::process::ExitCode;

use tracing::instrument::WithSubscriber;

use selfservice_portal::config;
use selfservice_portal::http::recovery::install_panic_hook;
use selfservice_portal::http::{build_pipeline, build_router, AppState};
use selfservice_portal::lifecycle::{ServeError, Server};
use selfservice_portal::net::Listener;
use selfservice_portal::observability::logging;
use selfservice_portal::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> ExitCode {
    install_panic_hook();
    let dispatch = logging::build_dispatch();

    match run().with_subscriber(dispatch).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "selfservice-portal starting");

    let config = config::load_from_env()?;
    tracing::info!(
        port = config.server.port,
        shutdown_grace_period = ?config.server.shutdown_grace_period,
        read_header_timeout = ?config.server.read_header_timeout,
        upstream_host = %config.upstream.credentials.host,
        "Configuration loaded"
    );

    let client = UpstreamClient::new(config.upstream)?;
    let pipeline = build_pipeline(build_router(AppState::new(client)?));

    let listener = Listener::bind(config.server.port).await.map_err(ServeError::from)?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Listening for connections");
    }

    Server::new(config.server, pipeline).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

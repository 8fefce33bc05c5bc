//! Server lifecycle orchestration.
//!
//! # Responsibilities
//! - Run the accept loop on its own task, one task per connection
//! - Race a fatal serve error against the external shutdown signal
//! - Drain in-flight requests within the grace period
//! - Release the top-level [`Shutdown`] once drained
//!
//! # Design Decisions
//! - Exactly one of the two events is honored (`tokio::select!`)
//! - The listener is dropped as soon as draining starts, so nothing new is
//!   accepted
//! - Connections still open when the grace period ends are aborted and the
//!   run fails with [`ServeError::ShutdownTimeout`]
//! - HTTP/1.1 only: every request runs on its connection's task, which
//!   carries the log dispatcher and is aborted on drain timeout. An HTTP/2
//!   preface is rejected by the parser.

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tower::ServiceExt;
use tracing::instrument::WithSubscriber;

use crate::config::ServerConfig;
use crate::http::server::Pipeline;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::state::LifecycleState;
use crate::net::{ConnectionCounter, Listener, ListenerError};

/// Errors that end a server run.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),

    #[error("error listening and serving: {0}")]
    Fatal(#[source] io::Error),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

impl From<ListenerError> for ServeError {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::Bind(e) => ServeError::Bind(e),
            ListenerError::Accept(e) => ServeError::Fatal(e),
        }
    }
}

/// What the accept loop hands back when asked to stop.
struct Drain {
    graceful: GracefulShutdown,
    tasks: JoinSet<()>,
}

/// The portal server.
pub struct Server {
    config: ServerConfig,
    pipeline: Pipeline,
    state: watch::Sender<LifecycleState>,
    shutdown: Shutdown,
    connections: ConnectionCounter,
}

impl Server {
    pub fn new(config: ServerConfig, pipeline: Pipeline) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            config,
            pipeline,
            state,
            shutdown: Shutdown::new(),
            connections: ConnectionCounter::new(),
        }
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Handle to the coordinator triggered after a clean drain.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serve until SIGINT or SIGTERM, then drain.
    pub async fn run(self, listener: Listener) -> Result<(), ServeError> {
        self.run_until(listener, async {
            let signal = shutdown_signal().await;
            tracing::info!(signal = %signal, "Shutdown signal received");
        })
        .await
    }

    /// Serve until `signal` resolves, then drain.
    pub async fn run_until<F>(self, listener: Listener, signal: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let mut serving = tokio::spawn(
            accept_loop(
                listener,
                self.pipeline.clone(),
                connection_builder(&self.config),
                self.connections.clone(),
                stop_rx,
            )
            .with_current_subscriber(),
        );
        self.transition(LifecycleState::Serving);

        tokio::select! {
            result = &mut serving => {
                let err = match result {
                    Ok(Err(e)) => e,
                    Ok(Ok(_)) => {
                        ServeError::Fatal(io::Error::other("accept loop stopped unexpectedly"))
                    }
                    Err(e) => ServeError::Task(e),
                };
                tracing::error!(error = %err, "Server failed");
                self.transition(LifecycleState::Failed);
                return Err(err);
            }
            _ = signal => {}
        }

        let grace = self.config.shutdown_grace_period;
        tracing::info!(
            grace_period = ?grace,
            connections = self.connections.count(),
            "Stopped accepting; draining in-flight requests"
        );
        self.transition(LifecycleState::Draining);
        let _ = stop_tx.send(());

        let Drain { graceful, mut tasks } = match serving.await {
            Ok(Ok(drain)) => drain,
            Ok(Err(e)) => {
                self.transition(LifecycleState::Failed);
                return Err(e);
            }
            Err(e) => {
                self.transition(LifecycleState::Failed);
                return Err(ServeError::Task(e));
            }
        };

        match tokio::time::timeout(grace, graceful.shutdown()).await {
            Ok(()) => {
                // Connection tasks have all returned; reap them.
                while tasks.join_next().await.is_some() {}
                self.shutdown.trigger();
                self.transition(LifecycleState::Stopped);
                tracing::info!("HTTP server stopped");
                Ok(())
            }
            Err(_) => {
                tracing::error!(
                    grace_period = ?grace,
                    connections = self.connections.count(),
                    "Grace period elapsed; dropping remaining connections"
                );
                tasks.shutdown().await;
                self.transition(LifecycleState::Failed);
                Err(ServeError::ShutdownTimeout(grace))
            }
        }
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        debug_assert!(previous.can_transition_to(next), "{previous} -> {next}");
        tracing::debug!(from = %previous, to = %next, "Lifecycle transition");
    }
}

fn connection_builder(config: &ServerConfig) -> http1::Builder {
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(config.read_header_timeout);
    builder
}

async fn accept_loop(
    mut listener: Listener,
    pipeline: Pipeline,
    builder: http1::Builder,
    connections: ConnectionCounter,
    mut stop: oneshot::Receiver<()>,
) -> Result<Drain, ServeError> {
    let graceful = GracefulShutdown::new();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let pipeline = pipeline.clone();
                let service = service_fn(move |request: Request<Incoming>| {
                    let mut request = request.map(Body::new);
                    request.extensions_mut().insert(ConnectInfo(peer));
                    pipeline.clone().oneshot(request)
                });
                let conn = graceful.watch(builder.serve_connection(TokioIo::new(stream), service));
                let open = connections.open(peer);

                tasks.spawn(
                    async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(
                                peer = %peer,
                                error = %e,
                                "Connection closed with error"
                            );
                        }
                        drop(open);
                    }
                    .with_current_subscriber(),
                );
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Connection task panicked");
                    }
                }
            }
        }
    }

    drop(listener);
    Ok(Drain { graceful, tasks })
}

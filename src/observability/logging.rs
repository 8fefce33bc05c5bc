//! Structured logging.
//!
//! # Responsibilities
//! - Build the JSON log dispatcher the server runs under
//! - Configure log level from `RUST_LOG`
//!
//! # Design Decisions
//! - No global default subscriber: `main` builds a [`Dispatch`] and attaches
//!   it to the server future; spawned connection tasks inherit it
//! - JSON to stdout, one object per event

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "selfservice_portal=info";

/// Build the production dispatcher: JSON events on stdout.
pub fn build_dispatch() -> Dispatch {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    json_dispatch(std::io::stdout, filter)
}

/// Build a JSON dispatcher writing to an arbitrary sink.
pub fn json_dispatch<W>(writer: W, filter: EnvFilter) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(writer),
    );
    Dispatch::new(subscriber)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory capture of JSON log events for assertions.

    use super::json_dispatch;
    use std::future::Future;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::instrument::WithSubscriber;
    use tracing_subscriber::fmt::MakeWriter;
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Default)]
    pub struct CapturedLogs {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedWriter;

        fn make_writer(&'a self) -> Self::Writer {
            CapturedWriter(self.buf.clone())
        }
    }

    impl CapturedLogs {
        pub fn new() -> Self {
            Self::default()
        }

        /// Run a future with every event it emits captured here.
        pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
            fut.with_subscriber(json_dispatch(self.clone(), EnvFilter::new("trace"))).await
        }

        pub fn events(&self) -> Vec<serde_json::Value> {
            let buf = self.buf.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }

        pub fn events_with_message(&self, message: &str) -> Vec<serde_json::Value> {
            self.events()
                .into_iter()
                .filter(|event| event["fields"]["message"] == message)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::CapturedLogs;

    #[tokio::test]
    async fn events_are_json_with_fields() {
        let logs = CapturedLogs::new();
        logs.scope(async {
            tracing::info!(port = 8080u16, "server started");
        })
        .await;

        let events = logs.events_with_message("server started");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["level"], "INFO");
        assert_eq!(events[0]["fields"]["port"], 8080);
    }

    #[tokio::test]
    async fn nothing_leaks_outside_the_scope() {
        let logs = CapturedLogs::new();
        tracing::info!("outside");
        logs.scope(async {}).await;
        assert!(logs.events().is_empty());
    }
}

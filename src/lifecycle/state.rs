//! Server lifecycle states.

use std::fmt;

/// Where the server is in its lifecycle.
///
/// ```text
/// Starting → Serving → Draining → Stopped
///               │          │
///               └──────────┴────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Listener bound, accept loop not running yet.
    Starting,
    /// Accepting and serving connections.
    Serving,
    /// No longer accepting; waiting for in-flight requests.
    Draining,
    /// Drained cleanly.
    Stopped,
    /// Fatal serve error, or the grace period ran out while draining.
    Failed,
}

impl LifecycleState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Starting, Serving)
                | (Serving, Draining)
                | (Serving, Failed)
                | (Draining, Stopped)
                | (Draining, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

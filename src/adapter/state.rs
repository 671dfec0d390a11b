//! Listener lifecycle state machine.
//!
//! # States
//! ```text
//! Starting → Running → Closing → Closed
//!                   ↘          ↘
//!                    Failed      Failed (close error)
//! ```
//!
//! # Design Decisions
//! - Closed and Failed are terminal; later transitions are ignored
//! - Each adapter publishes its state on a watch channel

use tokio::sync::watch;

/// Lifecycle state of one listener adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState {
    Starting,
    Running,
    Closing,
    Closed,
    Failed(String),
}

impl AdapterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdapterState::Closed | AdapterState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AdapterState::Starting => "starting",
            AdapterState::Running => "running",
            AdapterState::Closing => "closing",
            AdapterState::Closed => "closed",
            AdapterState::Failed(_) => "failed",
        }
    }
}

/// How one adapter ended up after shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseResult {
    Closed,
    Failed(String),
    /// The grace period elapsed before the adapter confirmed its close.
    TimedOut,
}

impl CloseResult {
    pub fn is_closed(&self) -> bool {
        matches!(self, CloseResult::Closed)
    }
}

impl std::fmt::Display for CloseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseResult::Closed => f.write_str("closed"),
            CloseResult::Failed(reason) => write!(f, "failed: {reason}"),
            CloseResult::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Move to `next` unless the current state is terminal.
/// Returns whether the transition happened.
pub(crate) fn transition(state: &watch::Sender<AdapterState>, next: AdapterState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            false
        } else {
            tracing::debug!(from = current.label(), to = next.label(), "Adapter state changed");
            *current = next;
            true
        }
    })
}

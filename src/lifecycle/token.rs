//! The shared shutdown token.
//!
//! A broadcast-once signal: every stop trigger funnels through
//! [`ShutdownToken::cancel`], the first one wins and is recorded, and every
//! later call is a no-op.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

use crate::adapter::ProtocolKind;

/// What caused the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// The platform service manager asked the process to stop.
    ServiceControl,
    /// A serve loop ended on its own.
    ListenerFailure {
        kind: ProtocolKind,
        address: SocketAddr,
    },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Interrupt => f.write_str("interrupt"),
            Trigger::ServiceControl => f.write_str("service-control"),
            Trigger::ListenerFailure { kind, address } => {
                write!(f, "listener-failure ({kind} on {address})")
            }
        }
    }
}

/// Cancellation token carrying the winning [`Trigger`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: CancellationToken,
    trigger: Arc<OnceLock<Trigger>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Returns `true` only for the call that won.
    ///
    /// The trigger is stored before the inner token is cancelled, so anyone
    /// observing cancellation also observes the trigger.
    pub fn cancel(&self, trigger: Trigger) -> bool {
        match self.trigger.set(trigger) {
            Ok(()) => {
                self.inner.cancel();
                true
            }
            Err(rejected) => {
                tracing::debug!(
                    trigger = %rejected,
                    "Shutdown already triggered, ignoring"
                );
                false
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// The winning trigger, once cancelled.
    pub fn trigger(&self) -> Option<Trigger> {
        if self.inner.is_cancelled() {
            self.trigger.get().cloned()
        } else {
            None
        }
    }

    /// Wait for cancellation and return its cause.
    pub async fn cancelled(&self) -> Trigger {
        self.inner.cancelled().await;
        self.trigger
            .get()
            .cloned()
            .expect("trigger is recorded before the token is cancelled")
    }

    /// A token cancelled together with this one, for collaborator internals.
    pub fn child_token(&self) -> CancellationToken {
        self.inner.child_token()
    }
}

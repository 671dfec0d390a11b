//! Platform service-manager stop hook.
//!
//! A service manager stops the process by invoking a callback and tears the
//! process down soon after the callback returns. [`ServiceControlHook`]
//! therefore fires the shutdown token and then holds the caller until the
//! coordinator acknowledges that cleanup has run, bounded by
//! `service_ack_timeout`.
//!
//! ```text
//! service manager ──request_stop──▶ hook ──cancel(ServiceControl)──▶ token
//!                                     │                                │
//!                                     │◀──────── acknowledge ──── coordinator
//!                                     ▼                           (after grace)
//!                                  returns (Acknowledged | TimedOut)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::token::{ShutdownToken, Trigger};

/// How a stop request was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAck {
    /// The coordinator finished and released the hook.
    Acknowledged,
    /// The hook gave up waiting.
    TimedOut,
}

#[derive(Debug)]
struct HookInner {
    token: ShutdownToken,
    ack_timeout: Duration,
    acknowledged: CancellationToken,
    released: CancellationToken,
    invoked: AtomicBool,
}

/// Registration of the service-manager stop callback.
#[derive(Debug, Clone)]
pub struct ServiceControlHook {
    inner: Arc<HookInner>,
}

impl ServiceControlHook {
    pub fn new(token: ShutdownToken, ack_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HookInner {
                token,
                ack_timeout,
                acknowledged: CancellationToken::new(),
                released: CancellationToken::new(),
                invoked: AtomicBool::new(false),
            }),
        }
    }

    /// Handle a stop request: trigger shutdown, then wait for the
    /// acknowledgement or `ack_timeout`, whichever comes first.
    pub async fn request_stop(&self) -> StopAck {
        let inner = &self.inner;
        inner.invoked.store(true, Ordering::SeqCst);

        tracing::warn!("Received service control stop request");
        inner.token.cancel(Trigger::ServiceControl);

        let ack = match tokio::time::timeout(inner.ack_timeout, inner.acknowledged.cancelled()).await
        {
            Ok(()) => StopAck::Acknowledged,
            Err(_) => {
                tracing::warn!(
                    timeout = ?inner.ack_timeout,
                    "Service stop acknowledgement timed out"
                );
                StopAck::TimedOut
            }
        };
        inner.released.cancel();
        ack
    }

    /// Blocking form of [`request_stop`](Self::request_stop) for callbacks that
    /// a native service dispatcher runs on its own thread. Must not be called
    /// from inside the runtime.
    pub fn request_stop_blocking(&self, runtime: &tokio::runtime::Handle) -> StopAck {
        runtime.block_on(self.request_stop())
    }

    pub fn was_invoked(&self) -> bool {
        self.inner.invoked.load(Ordering::SeqCst)
    }

    /// Release any pending stop request and wait until it has returned.
    ///
    /// Returns `false` immediately when no stop request was ever made, so
    /// callers never block on a hook that was not invoked.
    pub async fn acknowledge(&self) -> bool {
        self.inner.acknowledged.cancel();
        if !self.was_invoked() {
            return false;
        }
        self.inner.released.cancelled().await;
        true
    }
}

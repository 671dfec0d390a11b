//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for the interrupt signal (SIGINT / Ctrl+C)
//! - Listen for the service-manager stop request (SIGTERM on Unix,
//!   console close / system shutdown on Windows)
//! - Fire the shared shutdown token from whichever arrives first
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged and the source keeps
//!   waiting on the remaining triggers
//! - The source exits as soon as the token is cancelled by anyone, including
//!   a failed listener

use std::future::Future;
use tokio::task::JoinHandle;

use crate::lifecycle::service::ServiceControlHook;
use crate::lifecycle::token::{ShutdownToken, Trigger};

/// Spawns the task that turns external stop requests into cancellation.
pub struct SignalSource;

impl SignalSource {
    /// Listen for OS signals.
    pub fn spawn(token: ShutdownToken, hook: ServiceControlHook) -> JoinHandle<()> {
        Self::spawn_with(token, hook, interrupt(), service_stop())
    }

    /// Listen on arbitrary trigger futures.
    pub fn spawn_with<I, S>(
        token: ShutdownToken,
        hook: ServiceControlHook,
        interrupt: I,
        service_stop: S,
    ) -> JoinHandle<()>
    where
        I: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt => {
                    tracing::warn!("Received interrupt signal");
                    token.cancel(Trigger::Interrupt);
                }
                _ = service_stop => {
                    let ack = hook.request_stop().await;
                    tracing::debug!(ack = ?ack, "Service stop request released");
                }
                trigger = token.cancelled() => {
                    tracing::debug!(trigger = %trigger, "Signal source stopping");
                }
            }
        })
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn service_stop() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(windows)]
async fn service_stop() {
    use tokio::signal::windows::{ctrl_close, ctrl_shutdown};

    match (ctrl_close(), ctrl_shutdown()) {
        (Ok(mut close), Ok(mut shutdown)) => {
            tokio::select! {
                _ = close.recv() => {}
                _ = shutdown.recv() => {}
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Failed to install console control handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(any(unix, windows)))]
async fn service_stop() {
    std::future::pending::<()>().await;
}

//! Listener adapter: runs one bound server and closes it on cancellation.
//!
//! # Responsibilities
//! - Launch the serve loop without blocking the caller
//! - Observe the shared shutdown token and close the server exactly once
//! - Turn an unexpected serve-loop exit into a shutdown trigger
//!
//! # Design Decisions
//! - Two tasks per adapter: serve and observer. Neither ever panics on
//!   server errors; errors are logged and recorded
//! - The observer waits for `Running` before closing so a close never
//!   overtakes its own start

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use crate::adapter::server::{FileServer, ProtocolKind, ServerError};
use crate::adapter::state::{transition, AdapterState, CloseResult};
use crate::lifecycle::token::{ShutdownToken, Trigger};

/// Starts adapters for bound servers.
pub struct ListenerAdapter;

impl ListenerAdapter {
    /// Launch `server` and its cancellation observer. Returns immediately.
    pub fn start(server: Arc<dyn FileServer>, token: ShutdownToken) -> AdapterHandle {
        let kind = server.kind();
        let address = server.local_addr();

        let (state_tx, state_rx) = watch::channel(AdapterState::Starting);
        let state_tx = Arc::new(state_tx);
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(serve_task(
            Arc::clone(&server),
            token.clone(),
            Arc::clone(&state_tx),
        ));
        tokio::spawn(observer_task(server, token, state_tx, close_tx));

        AdapterHandle {
            kind,
            address,
            state: state_rx,
            close_rx,
        }
    }
}

async fn serve_task(
    server: Arc<dyn FileServer>,
    token: ShutdownToken,
    state: Arc<watch::Sender<AdapterState>>,
) {
    let kind = server.kind();
    let address = server.local_addr();

    transition(&state, AdapterState::Running);
    tracing::info!(
        kind = %kind,
        address = %address,
        root = %server.root().display(),
        "Listener running"
    );

    let result = server.serve().await;

    if token.is_cancelled() {
        match result {
            Ok(()) => tracing::debug!(kind = %kind, "Serve loop exited after close"),
            Err(e) => tracing::warn!(kind = %kind, error = %e, "Serve loop exited with error during shutdown"),
        }
        return;
    }

    let reason = match result {
        Ok(()) => ServerError::Stopped.to_string(),
        Err(e) => e.to_string(),
    };
    tracing::error!(kind = %kind, address = %address, error = %reason, "Listener failed");
    transition(&state, AdapterState::Failed(reason));
    token.cancel(Trigger::ListenerFailure { kind, address });
}

async fn observer_task(
    server: Arc<dyn FileServer>,
    token: ShutdownToken,
    state: Arc<watch::Sender<AdapterState>>,
    close_tx: oneshot::Sender<CloseResult>,
) {
    let kind = server.kind();
    token.cancelled().await;

    let mut started = state.subscribe();
    let _ = started
        .wait_for(|s| *s != AdapterState::Starting)
        .await;

    let failed_before = match &*state.borrow() {
        AdapterState::Failed(reason) => Some(reason.clone()),
        _ => None,
    };
    transition(&state, AdapterState::Closing);

    let result = match server.close().await {
        Ok(()) => {
            transition(&state, AdapterState::Closed);
            tracing::info!(kind = %kind, "Listener closed");
            CloseResult::Closed
        }
        Err(ServerError::AlreadyClosed) => {
            transition(&state, AdapterState::Closed);
            tracing::debug!(kind = %kind, "Listener was already closed");
            CloseResult::Closed
        }
        Err(e) => {
            tracing::warn!(kind = %kind, error = %e, "Listener close failed");
            transition(&state, AdapterState::Failed(e.to_string()));
            CloseResult::Failed(e.to_string())
        }
    };

    let result = match failed_before {
        Some(reason) => CloseResult::Failed(format!("serve failed: {reason}")),
        None => result,
    };
    let _ = close_tx.send(result);
}

/// Handle to a started adapter, owned by the shutdown coordinator.
#[derive(Debug)]
pub struct AdapterHandle {
    kind: ProtocolKind,
    address: SocketAddr,
    state: watch::Receiver<AdapterState>,
    close_rx: oneshot::Receiver<CloseResult>,
}

impl AdapterHandle {
    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Snapshot of the current lifecycle state.
    pub fn state(&self) -> AdapterState {
        self.state.borrow().clone()
    }

    /// A receiver that follows every state change.
    pub fn watch_state(&self) -> watch::Receiver<AdapterState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`.
    pub async fn wait_for_state(
        &mut self,
        predicate: impl FnMut(&AdapterState) -> bool,
    ) -> AdapterState {
        if let Ok(state) = self.state.wait_for(predicate).await {
            return state.clone();
        }
        self.state.borrow().clone()
    }

    /// Resolve once the observer has closed the server.
    pub async fn closed(self) -> CloseResult {
        self.close_rx
            .await
            .unwrap_or_else(|_| CloseResult::Failed("close observer dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::{CloseBehavior, FakeServer, ServeBehavior};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn start_returns_before_serving_finishes() {
        let server = Arc::new(FakeServer::new(ProtocolKind::PlainHttp));
        let token = ShutdownToken::new();
        let mut handle = ListenerAdapter::start(server.clone(), token.clone());

        let state = handle
            .wait_for_state(|s| *s == AdapterState::Running)
            .await;
        assert_eq!(state, AdapterState::Running);
        assert!(!token.is_cancelled());
        assert_eq!(server.close_calls.load(Ordering::SeqCst), 0);

        token.cancel(Trigger::Interrupt);
        assert_eq!(handle.closed().await, CloseResult::Closed);
    }

    #[tokio::test]
    async fn cancellation_closes_exactly_once() {
        let server = Arc::new(FakeServer::new(ProtocolKind::Ftp));
        let token = ShutdownToken::new();
        let handle = ListenerAdapter::start(server.clone(), token.clone());
        let mut states = handle.watch_state();

        assert!(token.cancel(Trigger::Interrupt));
        assert!(!token.cancel(Trigger::Interrupt));

        assert_eq!(handle.closed().await, CloseResult::Closed);
        let _ = states.wait_for(|s| *s == AdapterState::Closed).await;
        assert_eq!(server.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn serve_failure_cancels_token() {
        let server = Arc::new(
            FakeServer::new(ProtocolKind::PlainHttp).with_serve(ServeBehavior::FailImmediately),
        );
        let token = ShutdownToken::new();
        let handle = ListenerAdapter::start(server.clone(), token.clone());

        let trigger = token.cancelled().await;
        assert_eq!(
            trigger,
            Trigger::ListenerFailure {
                kind: ProtocolKind::PlainHttp,
                address: server.local_addr(),
            }
        );

        match handle.closed().await {
            CloseResult::Failed(reason) => assert!(reason.starts_with("serve failed")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(server.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_error_is_recorded_not_raised() {
        let server = Arc::new(FakeServer::new(ProtocolKind::Ftp).with_close(CloseBehavior::Error));
        let token = ShutdownToken::new();
        let handle = ListenerAdapter::start(server, token.clone());
        let mut states = handle.watch_state();

        token.cancel(Trigger::ServiceControl);
        assert!(matches!(handle.closed().await, CloseResult::Failed(_)));
        let state = states.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert!(matches!(state, AdapterState::Failed(_)));
    }
}

//! Shutdown coordination.
//!
//! # Sequence
//! ```text
//! token cancelled (interrupt | service-control | listener-failure)
//!     → every adapter observer closes its server (concurrently)
//!     → wait for close confirmations, bounded by grace_period
//!     → acknowledge the service hook, bounded by service_ack_timeout
//!     → ShutdownOutcome logged and returned
//! ```
//!
//! # Design Decisions
//! - Slow adapters are not killed; they are recorded as timed out and no
//!   longer waited on
//! - Close errors are recorded, never escalated
//! - Total wait after cancellation is at most
//!   `grace_period + service_ack_timeout`

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

use crate::adapter::{AdapterHandle, CloseResult, ProtocolKind};
use crate::config::ShutdownConfig;
use crate::lifecycle::service::ServiceControlHook;
use crate::lifecycle::token::{ShutdownToken, Trigger};

/// Timing policy for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPolicy {
    pub grace_period: Duration,
    pub service_ack_timeout: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self::from(&ShutdownConfig::default())
    }
}

impl From<&ShutdownConfig> for ShutdownPolicy {
    fn from(config: &ShutdownConfig) -> Self {
        Self {
            grace_period: config.grace_period(),
            service_ack_timeout: config.service_ack_timeout(),
        }
    }
}

/// Close result of one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOutcome {
    pub kind: ProtocolKind,
    pub address: SocketAddr,
    pub result: CloseResult,
}

/// Final report of a shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownOutcome {
    pub trigger: Trigger,
    /// In the order the adapters were handed to the coordinator.
    pub adapters: Vec<AdapterOutcome>,
    /// Whether a service stop request was released by the coordinator.
    pub service_acknowledged: bool,
    /// Time from cancellation to the end of the sequence.
    pub elapsed: Duration,
}

impl ShutdownOutcome {
    /// True when every adapter closed within the grace period.
    pub fn is_clean(&self) -> bool {
        self.adapters.iter().all(|a| a.result.is_closed())
    }

    fn log(&self) {
        for adapter in &self.adapters {
            match &adapter.result {
                CloseResult::Closed => tracing::info!(
                    kind = %adapter.kind,
                    address = %adapter.address,
                    "Adapter closed"
                ),
                result => tracing::warn!(
                    kind = %adapter.kind,
                    address = %adapter.address,
                    result = %result,
                    "Adapter did not close cleanly"
                ),
            }
        }
        tracing::info!(
            trigger = %self.trigger,
            clean = self.is_clean(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Shutdown complete"
        );
    }
}

/// Waits for cancellation and runs the bounded close sequence.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    policy: ShutdownPolicy,
}

impl ShutdownCoordinator {
    pub fn new(policy: ShutdownPolicy) -> Self {
        Self { policy }
    }

    /// Block until `token` is cancelled, then collect every adapter's close.
    pub async fn run(
        &self,
        adapters: Vec<AdapterHandle>,
        token: &ShutdownToken,
        hook: &ServiceControlHook,
    ) -> ShutdownOutcome {
        let trigger = token.cancelled().await;
        let started = Instant::now();
        tracing::warn!(
            trigger = %trigger,
            adapters = adapters.len(),
            "Shutdown triggered"
        );

        let mut outcomes: Vec<AdapterOutcome> = adapters
            .iter()
            .map(|adapter| AdapterOutcome {
                kind: adapter.kind(),
                address: adapter.local_addr(),
                result: CloseResult::TimedOut,
            })
            .collect();

        let mut pending: FuturesUnordered<_> = adapters
            .into_iter()
            .enumerate()
            .map(|(index, adapter)| async move { (index, adapter.closed().await) })
            .collect();

        let deadline = started + self.policy.grace_period;
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((index, result))) => outcomes[index].result = result,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        pending = pending.len(),
                        grace_period = ?self.policy.grace_period,
                        "Grace period elapsed before all listeners closed"
                    );
                    break;
                }
            }
        }
        drop(pending);

        let service_acknowledged =
            match tokio::time::timeout(self.policy.service_ack_timeout, hook.acknowledge()).await {
                Ok(released) => released,
                Err(_) => {
                    tracing::warn!(
                        timeout = ?self.policy.service_ack_timeout,
                        "Service hook did not return in time"
                    );
                    false
                }
            };

        let outcome = ShutdownOutcome {
            trigger,
            adapters: outcomes,
            service_acknowledged,
            elapsed: started.elapsed(),
        };
        outcome.log();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::{CloseBehavior, FakeServer, ServeBehavior};
    use crate::adapter::{FileServer, ListenerAdapter};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn policy() -> ShutdownPolicy {
        ShutdownPolicy {
            grace_period: Duration::from_secs(2),
            service_ack_timeout: Duration::from_secs(3),
        }
    }

    #[tokio::test]
    async fn interrupt_closes_every_adapter_once() {
        let token = ShutdownToken::new();
        let hook = ServiceControlHook::new(token.clone(), Duration::from_secs(3));
        let servers = [
            Arc::new(FakeServer::new(ProtocolKind::PlainHttp)),
            Arc::new(FakeServer::new(ProtocolKind::Ftp)),
        ];
        let handles = servers
            .iter()
            .map(|s| ListenerAdapter::start(s.clone(), token.clone()))
            .collect();

        token.cancel(Trigger::Interrupt);
        token.cancel(Trigger::Interrupt);
        let outcome = ShutdownCoordinator::new(policy()).run(handles, &token, &hook).await;

        assert_eq!(outcome.trigger, Trigger::Interrupt);
        assert!(outcome.is_clean());
        assert!(!outcome.service_acknowledged);
        assert_eq!(outcome.adapters[0].kind, ProtocolKind::PlainHttp);
        assert_eq!(outcome.adapters[1].kind, ProtocolKind::Ftp);
        for server in &servers {
            assert_eq!(server.close_calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_close_is_bounded_by_grace_period() {
        let token = ShutdownToken::new();
        let hook = ServiceControlHook::new(token.clone(), Duration::from_secs(3));
        let stuck = Arc::new(FakeServer::new(ProtocolKind::Ftp).with_close(CloseBehavior::Hang));
        let fine = Arc::new(FakeServer::new(ProtocolKind::PlainHttp));
        let handles = vec![
            ListenerAdapter::start(stuck, token.clone()),
            ListenerAdapter::start(fine, token.clone()),
        ];

        token.cancel(Trigger::Interrupt);
        let outcome = ShutdownCoordinator::new(policy()).run(handles, &token, &hook).await;

        assert_eq!(outcome.adapters[0].result, CloseResult::TimedOut);
        assert_eq!(outcome.adapters[1].result, CloseResult::Closed);
        assert!(!outcome.is_clean());
        assert!(outcome.elapsed >= Duration::from_secs(2));
        assert!(outcome.elapsed <= policy().grace_period + policy().service_ack_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn service_stop_is_acknowledged_after_close() {
        let token = ShutdownToken::new();
        let hook = ServiceControlHook::new(token.clone(), Duration::from_secs(3));
        let handles = vec![ListenerAdapter::start(
            Arc::new(FakeServer::new(ProtocolKind::EncodedHttp)),
            token.clone(),
        )];

        let stopping = hook.clone();
        let request = tokio::spawn(async move { stopping.request_stop().await });

        let outcome = ShutdownCoordinator::new(policy()).run(handles, &token, &hook).await;

        assert_eq!(outcome.trigger, Trigger::ServiceControl);
        assert!(outcome.service_acknowledged);
        assert!(outcome.is_clean());
        assert_eq!(
            request.await.unwrap(),
            crate::lifecycle::service::StopAck::Acknowledged
        );
    }

    #[tokio::test(start_paused = true)]
    async fn service_stop_with_hanging_close_stays_within_both_bounds() {
        let token = ShutdownToken::new();
        let hook = ServiceControlHook::new(token.clone(), policy().service_ack_timeout);
        let stuck = Arc::new(FakeServer::new(ProtocolKind::Ftp).with_close(CloseBehavior::Hang));
        let handles = vec![
            ListenerAdapter::start(stuck, token.clone()),
            ListenerAdapter::start(
                Arc::new(FakeServer::new(ProtocolKind::PlainHttp)),
                token.clone(),
            ),
        ];

        let stopping = hook.clone();
        let request = tokio::spawn(async move { stopping.request_stop().await });

        let outcome = ShutdownCoordinator::new(policy()).run(handles, &token, &hook).await;

        assert_eq!(outcome.trigger, Trigger::ServiceControl);
        assert_eq!(outcome.adapters[0].result, CloseResult::TimedOut);
        assert_eq!(outcome.adapters[1].result, CloseResult::Closed);
        assert!(outcome.service_acknowledged);
        assert!(outcome.elapsed >= policy().grace_period);
        assert!(outcome.elapsed <= policy().grace_period + policy().service_ack_timeout);
        assert_eq!(
            request.await.unwrap(),
            crate::lifecycle::service::StopAck::Acknowledged
        );
    }

    #[tokio::test]
    async fn listener_failure_stops_the_others() {
        let token = ShutdownToken::new();
        let hook = ServiceControlHook::new(token.clone(), Duration::from_secs(3));
        let failing = Arc::new(
            FakeServer::new(ProtocolKind::PlainHttp).with_serve(ServeBehavior::FailImmediately),
        );
        let healthy = Arc::new(FakeServer::new(ProtocolKind::Ftp));
        let handles = vec![
            ListenerAdapter::start(failing.clone(), token.clone()),
            ListenerAdapter::start(healthy.clone(), token.clone()),
        ];

        let outcome = ShutdownCoordinator::new(policy()).run(handles, &token, &hook).await;

        assert_eq!(
            outcome.trigger,
            Trigger::ListenerFailure {
                kind: ProtocolKind::PlainHttp,
                address: failing.local_addr(),
            }
        );
        assert!(matches!(outcome.adapters[0].result, CloseResult::Failed(_)));
        assert_eq!(outcome.adapters[1].result, CloseResult::Closed);
        assert_eq!(healthy.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_triggers_produce_one_shutdown() {
        let token = ShutdownToken::new();
        let hook = ServiceControlHook::new(token.clone(), Duration::from_millis(300));
        let failing = Arc::new(
            FakeServer::new(ProtocolKind::Ftp).with_serve(ServeBehavior::FailImmediately),
        );
        let healthy = Arc::new(FakeServer::new(ProtocolKind::PlainHttp));

        let interrupt = {
            let token = token.clone();
            tokio::spawn(async move { token.cancel(Trigger::Interrupt) })
        };
        let service = {
            let hook = hook.clone();
            tokio::spawn(async move { hook.request_stop().await })
        };
        let handles = vec![
            ListenerAdapter::start(failing, token.clone()),
            ListenerAdapter::start(healthy.clone(), token.clone()),
        ];

        let policy = ShutdownPolicy {
            grace_period: Duration::from_millis(200),
            service_ack_timeout: Duration::from_millis(300),
        };
        let outcome = ShutdownCoordinator::new(policy).run(handles, &token, &hook).await;

        interrupt.await.unwrap();
        service.await.unwrap();
        assert_eq!(token.trigger(), Some(outcome.trigger.clone()));
        assert_eq!(healthy.close_calls.load(Ordering::SeqCst), 1);
    }
}

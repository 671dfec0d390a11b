//! The collaborator server contract.
//!
//! Every protocol server (plain HTTP, encoded HTTP, FTP) is bound up front
//! and then driven through this narrow interface; the adapter never sees
//! protocol details.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Which protocol a listener speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// Directory-style HTTP static file serving.
    PlainHttp,
    /// HTTP serving `/{base64url(path)}`.
    EncodedHttp,
    /// FTP control + passive data connections.
    Ftp,
}

impl ProtocolKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolKind::PlainHttp => "http",
            ProtocolKind::EncodedHttp => "http-encoded",
            ProtocolKind::Ftp => "ftp",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors returned by a collaborator server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `close` was called more than once.
    #[error("server already closed")]
    AlreadyClosed,
    /// `serve` was called without a bound listener (already served or closed).
    #[error("server is not listening")]
    NotListening,
    /// The serve loop returned although nobody asked it to stop.
    #[error("serve loop stopped unexpectedly")]
    Stopped,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A bound protocol server.
#[async_trait]
pub trait FileServer: Send + Sync + 'static {
    fn kind(&self) -> ProtocolKind;

    /// Address the listening socket is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Directory served.
    fn root(&self) -> &Path;

    /// Run the accept loop. Returns `Ok(())` once `close` has been called.
    async fn serve(&self) -> Result<(), ServerError>;

    /// Stop accepting and resolve once the listening socket is released.
    /// A second call returns [`ServerError::AlreadyClosed`].
    async fn close(&self) -> Result<(), ServerError>;
}

/// Owns a server's listening socket and its close/stopped handshake.
///
/// `close` cancels the close token and then waits until the serve loop
/// drops its [`StoppedGuard`]. If serving never started, `close` drops the
/// socket itself.
#[derive(Debug)]
pub struct ServeControl {
    listener: Mutex<Option<TcpListener>>,
    close: CancellationToken,
    stopped: watch::Sender<bool>,
    closed: AtomicBool,
}

impl ServeControl {
    pub fn new(listener: TcpListener) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            listener: Mutex::new(Some(listener)),
            close: CancellationToken::new(),
            stopped,
            closed: AtomicBool::new(false),
        }
    }

    /// Take the listener for the serve loop.
    pub fn take_listener(&self) -> Result<TcpListener, ServerError> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(ServerError::NotListening)
    }

    /// Token cancelled when `close` is called.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// Guard held by the serve loop; marks the server stopped when dropped.
    pub fn stopped_guard(&self) -> StoppedGuard<'_> {
        StoppedGuard {
            stopped: &self.stopped,
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    pub async fn close(&self) -> Result<(), ServerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyClosed);
        }
        self.close.cancel();

        let unserved = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if unserved.is_some() {
            drop(unserved);
            self.stopped.send_replace(true);
        }

        let mut stopped = self.stopped.subscribe();
        stopped
            .wait_for(|stopped| *stopped)
            .await
            .map_err(|_| ServerError::NotListening)?;
        Ok(())
    }
}

/// Marks the owning server as stopped when dropped.
#[derive(Debug)]
pub struct StoppedGuard<'a> {
    stopped: &'a watch::Sender<bool>,
}

impl Drop for StoppedGuard<'_> {
    fn drop(&mut self) {
        self.stopped.send_replace(true);
    }
}

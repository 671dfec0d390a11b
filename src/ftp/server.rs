//! FTP accept loop.
//!
//! # Responsibilities
//! - Bind the control listener up front
//! - Enforce `max_sessions` via semaphore
//! - Spawn one [`Session`] per client and cancel them all on close
//!
//! # Design Decisions
//! - Sessions get a child of the close token, so one cancel reaches every
//!   live session
//! - `serve` returns only once every session task has finished, which is
//!   what `close` waits for
//! - Descriptor or memory exhaustion on accept is retried with backoff.
//!   Other listener errors end `serve` with an error so the adapter reports
//!   a listener failure

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::adapter::{FileServer, ProtocolKind, ServeControl, ServerError};
use crate::config::FtpConfig;
use crate::ftp::auth::Credentials;
use crate::ftp::session::{Session, SessionContext};
use crate::net::connection::SessionTracker;
use crate::net::{self, BindError};

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

#[cfg(target_os = "linux")]
const RESOURCE_ERRNOS: &[i32] = &[12, 23, 24, 105]; // ENOMEM ENFILE EMFILE ENOBUFS
#[cfg(all(unix, not(target_os = "linux")))]
const RESOURCE_ERRNOS: &[i32] = &[12, 23, 24, 55];
#[cfg(windows)]
const RESOURCE_ERRNOS: &[i32] = &[10024, 10055]; // WSAEMFILE WSAENOBUFS
#[cfg(not(any(unix, windows)))]
const RESOURCE_ERRNOS: &[i32] = &[];

/// Source of control connections.
#[async_trait]
trait Accept: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Accept for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// What an `accept` error means for the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// One client's connection went away; keep accepting.
    Connection,
    /// The process is out of descriptors or memory; retry after a pause.
    Resources,
    /// The listener itself is broken.
    Fatal,
}

fn classify_accept_error(error: &io::Error) -> AcceptFailure {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => AcceptFailure::Connection,
        io::ErrorKind::OutOfMemory => AcceptFailure::Resources,
        _ => match error.raw_os_error() {
            Some(code) if RESOURCE_ERRNOS.contains(&code) => AcceptFailure::Resources,
            _ => AcceptFailure::Fatal,
        },
    }
}

/// Doubles from `ACCEPT_BACKOFF_MIN` up to `ACCEPT_BACKOFF_MAX`.
fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => ACCEPT_BACKOFF_MIN,
        Some(delay) => (delay * 2).min(ACCEPT_BACKOFF_MAX),
    }
}

/// FTP settings beyond address, root and credentials.
#[derive(Debug, Clone)]
pub struct FtpOptions {
    pub greeting: String,
    pub max_sessions: usize,
    pub data_timeout: Duration,
}

impl Default for FtpOptions {
    fn default() -> Self {
        Self::from(&FtpConfig::default())
    }
}

impl From<&FtpConfig> for FtpOptions {
    fn from(config: &FtpConfig) -> Self {
        Self {
            greeting: config.greeting.clone(),
            max_sessions: config.max_sessions,
            data_timeout: config.data_timeout(),
        }
    }
}

/// FTP server with passive-mode transfers under one root.
#[derive(Debug)]
pub struct FtpServer {
    local_addr: SocketAddr,
    control: ServeControl,
    context: Arc<SessionContext>,
    session_limit: Arc<Semaphore>,
    sessions: SessionTracker,
}

impl FtpServer {
    /// Bind the control listener.
    pub async fn bind(
        addr: SocketAddr,
        root: PathBuf,
        credentials: Credentials,
        options: FtpOptions,
    ) -> Result<Self, BindError> {
        let listener = net::bind(addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BindError::Bind { addr, source })?;

        Ok(Self {
            local_addr,
            control: ServeControl::new(listener),
            context: Arc::new(SessionContext {
                root,
                credentials,
                greeting: options.greeting,
                data_timeout: options.data_timeout,
            }),
            session_limit: Arc::new(Semaphore::new(options.max_sessions)),
            sessions: SessionTracker::new(),
        })
    }

    /// Number of connected control sessions.
    pub fn active_sessions(&self) -> u64 {
        self.sessions.active_count()
    }

    fn admit(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        cancel: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match Arc::clone(&self.session_limit).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(peer = %peer, "Session limit reached, rejecting client");
                tasks.spawn(reject(stream));
                return;
            }
        };

        let guard = self.sessions.track();
        let id = guard.id();
        let session = match Session::new(id, stream, Arc::clone(&self.context)) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Failed to set up session");
                return;
            }
        };

        tracing::info!(session = %id, peer = %peer, "FTP client connected");
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let _guard = guard;
            match session.run(cancel).await {
                Ok(()) => tracing::info!(session = %id, "FTP client disconnected"),
                Err(e) => tracing::debug!(session = %id, error = %e, "FTP session ended"),
            }
        });
    }

    async fn accept_loop<A: Accept>(
        &self,
        listener: &A,
        close: &CancellationToken,
        sessions: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), ServerError> {
        let mut backoff = None;
        loop {
            tokio::select! {
                _ = close.cancelled() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff = None;
                        self.admit(stream, peer, sessions, tasks);
                    }
                    Err(e) => match classify_accept_error(&e) {
                        AcceptFailure::Connection => {
                            tracing::debug!(error = %e, "FTP client dropped during accept");
                        }
                        AcceptFailure::Resources => {
                            let delay = next_backoff(backoff);
                            backoff = Some(delay);
                            tracing::warn!(
                                error = %e,
                                retry_in = ?delay,
                                "Out of resources accepting FTP connection"
                            );
                            tokio::select! {
                                _ = close.cancelled() => return Ok(()),
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        AcceptFailure::Fatal => {
                            tracing::error!(error = %e, "FTP listener failed");
                            return Err(ServerError::Io(e));
                        }
                    },
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "FTP session task panicked");
                    }
                }
            }
        }
    }
}

async fn reject(mut stream: TcpStream) {
    let _ = stream.write_all(b"421 Too many connections\r\n").await;
    let _ = stream.shutdown().await;
}

#[async_trait]
impl FileServer for FtpServer {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ftp
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn root(&self) -> &Path {
        &self.context.root
    }

    async fn serve(&self) -> Result<(), ServerError> {
        let listener = self.control.take_listener()?;
        let _stopped = self.control.stopped_guard();
        let close = self.control.close_token();
        let sessions = close.child_token();
        let mut tasks = JoinSet::new();

        let result = self
            .accept_loop(&listener, &close, &sessions, &mut tasks)
            .await;

        drop(listener);
        let open = self.sessions.active_count();
        if open > 0 {
            tracing::info!(sessions = open, "Closing FTP sessions");
        }
        sessions.cancel();
        while tasks.join_next().await.is_some() {}

        tracing::info!(address = %self.local_addr, "FTP server stopped");
        result
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.control.close().await
    }
}

//! In-memory server used by adapter and coordinator tests.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::adapter::server::{FileServer, ProtocolKind, ServerError};

static NEXT_PORT: AtomicU16 = AtomicU16::new(40_000);

#[derive(Debug, Clone, Copy)]
pub enum ServeBehavior {
    /// Serve until closed, then return Ok.
    UntilClosed,
    /// Return an I/O error right away.
    FailImmediately,
}

#[derive(Debug, Clone, Copy)]
pub enum CloseBehavior {
    Ok,
    Error,
    /// Never resolve.
    Hang,
}

#[derive(Debug)]
pub struct FakeServer {
    kind: ProtocolKind,
    address: SocketAddr,
    root: PathBuf,
    serve_behavior: ServeBehavior,
    close_behavior: CloseBehavior,
    closed: CancellationToken,
    pub close_calls: AtomicUsize,
}

impl FakeServer {
    pub fn new(kind: ProtocolKind) -> Self {
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        Self {
            kind,
            address: SocketAddr::from(([127, 0, 0, 1], port)),
            root: PathBuf::from("/srv/fake"),
            serve_behavior: ServeBehavior::UntilClosed,
            close_behavior: CloseBehavior::Ok,
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_serve(mut self, behavior: ServeBehavior) -> Self {
        self.serve_behavior = behavior;
        self
    }

    pub fn with_close(mut self, behavior: CloseBehavior) -> Self {
        self.close_behavior = behavior;
        self
    }
}

#[async_trait]
impl FileServer for FakeServer {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    fn local_addr(&self) -> SocketAddr {
        self.address
    }

    fn root(&self) -> &Path {
        &self.root
    }

    async fn serve(&self) -> Result<(), ServerError> {
        match self.serve_behavior {
            ServeBehavior::UntilClosed => {
                self.closed.cancelled().await;
                Ok(())
            }
            ServeBehavior::FailImmediately => Err(ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "simulated transport failure",
            ))),
        }
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        match self.close_behavior {
            CloseBehavior::Ok => {
                self.closed.cancel();
                Ok(())
            }
            CloseBehavior::Error => Err(ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated close failure",
            ))),
            CloseBehavior::Hang => std::future::pending().await,
        }
    }
}

//! HTTP file server setup.
//!
//! # Responsibilities
//! - Build the Axum router for raw or encoded URLs
//! - Wire up middleware (tracing, request ID)
//! - Serve on the pre-bound listener until closed
//!
//! # Design Decisions
//! - The socket is bound in `bind`, so a bind failure surfaces at startup
//!   and not inside the serve loop
//! - Graceful shutdown is driven by the [`ServeControl`] close token

use async_trait::async_trait;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::adapter::{FileServer, ProtocolKind, ServeControl, ServerError};
use crate::http::{encoded, listing, request};
use crate::net::{self, BindError};

/// How request paths map onto files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMode {
    /// `/docs/a.txt` serves `<root>/docs/a.txt`.
    Raw,
    /// `/{base64url(relative path)}` serves `<root>/<relative path>`.
    Encoded,
}

/// Static file server over HTTP/1.1.
pub struct HttpFileServer {
    root: PathBuf,
    mode: UrlMode,
    local_addr: SocketAddr,
    control: ServeControl,
    router: Router,
}

impl HttpFileServer {
    /// Bind the listening socket for `root` in `mode`.
    pub async fn bind(addr: SocketAddr, root: PathBuf, mode: UrlMode) -> Result<Self, BindError> {
        let listener = net::bind(addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BindError::Bind { addr, source })?;

        let router = Self::build_router(&root, mode);
        Ok(Self {
            root,
            mode,
            local_addr,
            control: ServeControl::new(listener),
            router,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(root: &Path, mode: UrlMode) -> Router {
        let state = Arc::new(root.to_path_buf());
        let router = match mode {
            UrlMode::Raw => {
                let listing = get(listing::directory_listing).with_state(state);
                Router::new().fallback_service(ServeDir::new(root).fallback(listing))
            }
            UrlMode::Encoded => Router::new()
                .route("/{file}", get(encoded::serve_encoded))
                .with_state(state),
        };

        router
            .layer(request::propagate_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id())
    }
}

impl std::fmt::Debug for HttpFileServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFileServer")
            .field("root", &self.root)
            .field("mode", &self.mode)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FileServer for HttpFileServer {
    fn kind(&self) -> ProtocolKind {
        match self.mode {
            UrlMode::Raw => ProtocolKind::PlainHttp,
            UrlMode::Encoded => ProtocolKind::EncodedHttp,
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn root(&self) -> &Path {
        &self.root
    }

    async fn serve(&self) -> Result<(), ServerError> {
        let listener = self.control.take_listener()?;
        let _stopped = self.control.stopped_guard();

        if self.mode == UrlMode::Encoded {
            tracing::info!(
                address = %self.local_addr,
                sample = %format!("/{}", encoded::encode_path("path/to/file.txt")),
                "Encoded URLs enabled"
            );
        }

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(self.control.close_token().cancelled_owned())
            .await?;

        tracing::info!(address = %self.local_addr, "HTTP server stopped");
        Ok(())
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.control.close().await
    }
}

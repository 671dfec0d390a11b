//! TCP listener binding.
//!
//! # Responsibilities
//! - Parse configured bind addresses, including the `:port` shorthand
//! - Bind the listening socket before any server reports itself running
//!
//! # Design Decisions
//! - Bind failure is startup-fatal; callers propagate it straight to `main`
//! - `:port` means every IPv4 interface, as with Go-style addresses

use std::net::{SocketAddr, ToSocketAddrs};
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// The configured address could not be parsed or resolved.
    #[error("invalid bind address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },
    /// The socket could not be bound (e.g., address in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Parse a bind address such as `0.0.0.0:8000`, `[::1]:21`, `localhost:8000`
/// or `:8000`.
pub fn parse_bind_address(addr: &str) -> Result<SocketAddr, BindError> {
    let normalized = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };

    if let Ok(parsed) = normalized.parse::<SocketAddr>() {
        return Ok(parsed);
    }

    let invalid = |reason: String| BindError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    };
    normalized
        .to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses resolved".to_string()))
}

/// Bind a TCP listener to `addr`.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, BindError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::Bind { addr, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| BindError::Bind { addr, source })?;

    tracing::debug!(address = %local_addr, "Listener bound");
    Ok(listener)
}

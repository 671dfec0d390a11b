//! netfs
//!
//! Shares one directory over plain or encoded-URL HTTP and over FTP.
//!
//! # Architecture Overview
//!
//! ```text
//!          ┌───────────────────────── netfs ─────────────────────────┐
//!          │                                                         │
//!  HTTP ───┼─▶ http::HttpFileServer ──┐                              │
//!          │                          ├─▶ adapter::ListenerAdapter   │
//!  FTP  ───┼─▶ ftp::FtpServer ────────┘          │                   │
//!          │                                     ▼                   │
//!  SIGINT ─┼─▶ lifecycle::signals ──▶ ShutdownToken ──▶ Coordinator  │
//!  stop   ─┼─▶ lifecycle::service ──┘        (first trigger wins)    │
//!          └─────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use netfs::config::Cli;
use netfs::lifecycle::{self, StartupError};
use netfs::observability::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config().map_err(StartupError::from)?;
    init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root = %config.root.display(),
        http_address = %config.http.bind_address,
        ftp_address = %config.ftp.bind_address,
        encode_url = config.http.encode_url,
        "netfs starting"
    );

    let outcome = match lifecycle::run(&config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    tracing::warn!(trigger = %outcome.trigger, clean = outcome.is_clean(), "netfs quit");
    Ok(())
}

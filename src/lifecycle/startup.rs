//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve and create the root directory
//! - Bind every listener before any of them starts serving
//! - Start the adapters and the signal source, then hand over to the
//!   shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is left running
//! - Listeners start last (traffic only when every socket is bound)

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapter::{AdapterHandle, FileServer, ListenerAdapter};
use crate::config::{ConfigError, NetfsConfig};
use crate::ftp::{Credentials, FtpOptions, FtpServer};
use crate::http::{HttpFileServer, UrlMode};
use crate::lifecycle::service::ServiceControlHook;
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownPolicy};
use crate::lifecycle::signals::SignalSource;
use crate::lifecycle::token::ShutdownToken;
use crate::net::{parse_bind_address, BindError};

/// Errors that abort the process before serving begins.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to prepare root directory {path}: {source}")]
    RootDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("root path {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Make `root` absolute. An empty path means the current directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf, StartupError> {
    let cwd = || {
        std::env::current_dir().map_err(|source| StartupError::RootDirectory {
            path: root.to_path_buf(),
            source,
        })
    };

    if root.as_os_str().is_empty() {
        return cwd();
    }
    if root.is_absolute() {
        Ok(root.to_path_buf())
    } else {
        Ok(cwd()?.join(root))
    }
}

/// Ensure `root` exists as a directory, creating it (and parents) if missing.
pub fn ensure_root_dir(root: &Path) -> Result<(), StartupError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StartupError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir_all(root).map_err(|source| StartupError::RootDirectory {
                path: root.to_path_buf(),
                source,
            })?;
            tracing::info!(root = %root.display(), "Created root directory");
            Ok(())
        }
        Err(source) => Err(StartupError::RootDirectory {
            path: root.to_path_buf(),
            source,
        }),
    }
}

/// Bind the HTTP server (plain or encoded) and the FTP server.
///
/// If a later bind fails, servers bound so far are dropped, releasing their
/// sockets.
pub async fn bind_servers(
    config: &NetfsConfig,
    root: &Path,
) -> Result<Vec<Arc<dyn FileServer>>, StartupError> {
    let mode = if config.http.encode_url {
        UrlMode::Encoded
    } else {
        UrlMode::Raw
    };
    let http_addr = parse_bind_address(&config.http.bind_address)?;
    let http = HttpFileServer::bind(http_addr, root.to_path_buf(), mode).await?;

    let ftp_addr = parse_bind_address(&config.ftp.bind_address)?;
    let credentials = Credentials::new(&config.ftp.username, &config.ftp.password);
    let ftp = FtpServer::bind(
        ftp_addr,
        root.to_path_buf(),
        credentials,
        FtpOptions::from(&config.ftp),
    )
    .await?;

    let servers: Vec<Arc<dyn FileServer>> = vec![Arc::new(http), Arc::new(ftp)];
    Ok(servers)
}

/// Everything running after a successful launch.
#[derive(Debug)]
pub struct Launched {
    pub root: PathBuf,
    pub token: ShutdownToken,
    pub hook: ServiceControlHook,
    pub adapters: Vec<AdapterHandle>,
}

/// Prepare the root, bind all listeners and start their adapters.
pub async fn launch(config: &NetfsConfig) -> Result<Launched, StartupError> {
    let root = resolve_root(&config.root)?;
    ensure_root_dir(&root)?;

    let servers = bind_servers(config, &root).await?;

    let token = ShutdownToken::new();
    let hook = ServiceControlHook::new(token.clone(), config.shutdown.service_ack_timeout());
    let adapters = servers
        .into_iter()
        .map(|server| ListenerAdapter::start(server, token.clone()))
        .collect();

    Ok(Launched {
        root,
        token,
        hook,
        adapters,
    })
}

/// Run netfs until a stop trigger arrives and shutdown completes.
pub async fn run(config: &NetfsConfig) -> Result<ShutdownOutcome, StartupError> {
    let launched = launch(config).await?;
    tracing::info!(root = %launched.root.display(), "Serving directory");

    let _signals = SignalSource::spawn(launched.token.clone(), launched.hook.clone());
    let coordinator = ShutdownCoordinator::new(ShutdownPolicy::from(&config.shutdown));
    Ok(coordinator
        .run(launched.adapters, &launched.token, &launched.hook)
        .await)
}

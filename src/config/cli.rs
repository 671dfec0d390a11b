//! Command-line flags.
//!
//! Every flag is optional so that an explicitly given flag can override the
//! TOML file, which in turn overrides the defaults.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::NetfsConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "netfs")]
#[command(version, about = "Serve a directory over HTTP and FTP", long_about = None)]
pub struct Cli {
    /// Root directory to serve, created if it does not exist [default: .]
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// HTTP bind address [default: :8000]
    #[arg(long = "http-addr")]
    pub http_addr: Option<String>,

    /// FTP bind address [default: :2121]
    #[arg(long = "ftp-addr")]
    pub ftp_addr: Option<String>,

    /// Username for FTP login [default: admin]
    #[arg(long)]
    pub user: Option<String>,

    /// Password for FTP login [default: password]
    #[arg(long)]
    pub pass: Option<String>,

    /// Serve files at base64-encoded URLs
    #[arg(long = "encode-url")]
    pub encode_url: bool,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Time listeners get to close after a stop trigger
    #[arg(long = "grace-period-ms")]
    pub grace_period_ms: Option<u64>,

    /// Time a service stop request waits for shutdown to be acknowledged
    #[arg(long = "service-ack-timeout-ms")]
    pub service_ack_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Build the validated configuration: defaults, then the file, then flags.
    pub fn into_config(self) -> Result<NetfsConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => NetfsConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut NetfsConfig) {
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(addr) = self.http_addr {
            config.http.bind_address = addr;
        }
        if let Some(addr) = self.ftp_addr {
            config.ftp.bind_address = addr;
        }
        if let Some(user) = self.user {
            config.ftp.username = user;
        }
        if let Some(pass) = self.pass {
            config.ftp.password = pass;
        }
        if self.encode_url {
            config.http.encode_url = true;
        }
        if let Some(ms) = self.grace_period_ms {
            config.shutdown.grace_period_ms = ms;
        }
        if let Some(ms) = self.service_ack_timeout_ms {
            config.shutdown.service_ack_timeout_ms = ms;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

//! Configuration schema definitions.
//!
//! All types derive Serde traits so a TOML file can provide any subset of
//! fields; everything missing falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for netfs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetfsConfig {
    /// Directory to serve. Created on startup if it does not exist.
    /// An empty path means the current working directory.
    pub root: PathBuf,

    /// HTTP listener settings.
    pub http: HttpConfig,

    /// FTP listener settings.
    pub ftp: FtpConfig,

    /// Shutdown timing.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for NetfsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            http: HttpConfig::default(),
            ftp: FtpConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8000" or ":8000").
    pub bind_address: String,

    /// Serve files at `/{base64url(relative path)}` instead of plain paths.
    pub encode_url: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: ":8000".to_string(),
            encode_url: false,
        }
    }
}

/// FTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FtpConfig {
    /// Bind address for the control connection.
    pub bind_address: String,

    /// Login name accepted by the server.
    pub username: String,

    /// Password for `username`.
    pub password: String,

    /// Maximum concurrent control sessions.
    pub max_sessions: usize,

    /// How long a passive data listener waits for the client to connect.
    pub data_timeout_secs: u64,

    /// Text sent with the 220 greeting.
    pub greeting: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            bind_address: ":2121".to_string(),
            username: "admin".to_string(),
            password: "password".to_string(),
            max_sessions: 64,
            data_timeout_secs: 30,
            greeting: "netfs FTP server ready".to_string(),
        }
    }
}

impl FtpConfig {
    /// Passive data accept timeout as a Duration.
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }
}

/// Shutdown timing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long the coordinator waits for listeners to close.
    pub grace_period_ms: u64,

    /// How long a service-manager stop request blocks waiting for the
    /// coordinator to acknowledge. Must exceed `grace_period_ms`.
    pub service_ack_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 2_000,
            service_ack_timeout_ms: 3_000,
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn service_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.service_ack_timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

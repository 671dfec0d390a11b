//! netfs: serve one directory over HTTP and FTP until told to stop.

pub mod adapter;
pub mod config;
pub mod ftp;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use adapter::{AdapterHandle, FileServer, ListenerAdapter, ProtocolKind};
pub use config::schema::NetfsConfig;
pub use lifecycle::{ShutdownCoordinator, ShutdownOutcome, ShutdownToken, Trigger};

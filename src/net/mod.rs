//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address string
//!     → listener.rs (parse, bind; failure is startup-fatal)
//!     → handed to a collaborator server (http/, ftp/)
//!
//! Accepted FTP control connection
//!     → connection.rs (session ID, open-session tracking)
//! ```

pub mod connection;
pub mod listener;

pub use listener::{bind, parse_bind_address, BindError};

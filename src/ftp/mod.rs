//! FTP protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Control connection
//!     → server.rs (accept, session limit, child cancel token)
//!     → session.rs (read line → command.rs parse → dispatch → reply.rs)
//!     → path.rs (virtual path → real path under root)
//!     → PASV/EPSV data connection for LIST/NLST (listing.rs), RETR, STOR, APPE
//! ```

pub mod auth;
pub mod command;
pub mod listing;
pub mod path;
pub mod reply;
pub mod server;
mod session;

pub use auth::Credentials;
pub use command::{parse_command, Command};
pub use path::VirtualPath;
pub use reply::Reply;
pub use server::{FtpOptions, FtpServer};

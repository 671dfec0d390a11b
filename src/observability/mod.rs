//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!
//! Fields in use:
//!     kind, address   listener identity
//!     trigger         why shutdown started
//!     session         FTP control connection
//!     x-request-id    HTTP request (TraceLayer spans)
//! ```

pub mod logging;

pub use logging::init_logging;

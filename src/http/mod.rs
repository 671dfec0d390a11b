//! HTTP file serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → Raw:     ServeDir → listing.rs when a directory has no index.html
//!     → Encoded: encoded.rs (base64url segment → path under root) → ServeFile
//!     → Send to client
//! ```

pub mod encoded;
pub mod listing;
pub mod request;
pub mod server;

pub use encoded::{decode_path, encode_path, DecodeError};
pub use request::X_REQUEST_ID;
pub use server::{HttpFileServer, UrlMode};

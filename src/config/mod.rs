//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → explicit CLI flags (cli.rs)
//!     → validation.rs (semantic checks)
//!     → NetfsConfig (validated, immutable)
//!     → passed by reference to startup and the shutdown coordinator
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; nothing reconfigures a running process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{read_config, ConfigError};
pub use schema::{FtpConfig, HttpConfig, NetfsConfig, ObservabilityConfig, ShutdownConfig};
pub use validation::ValidationError;

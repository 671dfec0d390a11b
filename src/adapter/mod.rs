//! Listener adapter subsystem.
//!
//! # Data Flow
//! ```text
//! bound collaborator server (http/, ftp/)
//!     → server.rs (FileServer contract: serve / close)
//!     → handle.rs (serve task + cancellation observer)
//!     → state.rs (Starting → Running → Closing → Closed | Failed)
//!     → AdapterHandle handed to the shutdown coordinator
//! ```
//!
//! # Design Decisions
//! - Adapters hold their server by composition (`Arc<dyn FileServer>`)
//! - A serve loop that dies on its own cancels the shared token, so the
//!   remaining listeners stop with it

pub mod handle;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use handle::{AdapterHandle, ListenerAdapter};
pub use server::{FileServer, ProtocolKind, ServeControl, ServerError};
pub use state::{AdapterState, CloseResult};

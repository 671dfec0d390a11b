//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve root → Create if missing → Bind every listener → Start adapters
//!
//! Triggers (signals.rs, service.rs, adapter serve loops):
//!     SIGINT/Ctrl+C          → cancel(Interrupt)
//!     service-manager stop   → cancel(ServiceControl), hold caller until ack
//!     serve loop died        → cancel(ListenerFailure)
//!
//! Shutdown (shutdown.rs):
//!     token cancelled → adapters close → bounded wait → ack hook → outcome
//! ```
//!
//! # Design Decisions
//! - One token (token.rs), first trigger wins, so only one shutdown runs
//! - Ordered startup: root, then sockets, then serving
//! - Shutdown has deadlines, never a fixed sleep

pub mod service;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod token;

pub use service::{ServiceControlHook, StopAck};
pub use shutdown::{AdapterOutcome, ShutdownCoordinator, ShutdownOutcome, ShutdownPolicy};
pub use signals::SignalSource;
pub use startup::{launch, run, Launched, StartupError};
pub use token::{ShutdownToken, Trigger};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (http::server):
//!     Compile routes → Bind listener → Spawn accept loop → ready callback
//!
//! Close (shutdown.rs):
//!     Trigger → Stop accepting → Connections shut down gracefully → Drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger close
//! ```
//!
//! # Design Decisions
//! - All lifecycle state lives in a `ServerHandle`; no process-wide singletons
//! - Shutdown has a timeout: remaining connections are dropped after it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};

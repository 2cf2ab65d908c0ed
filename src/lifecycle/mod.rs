//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load payload → Draw route → Bind listener → Connect tunnel → Report URLs
//!
//! Serving (shutdown.rs):
//!     Timer │ delivery notification │ signal  →  first one wins
//!
//! Shutdown (shutdown.rs):
//!     Disconnect tunnel → Close listener → Drain connections → Outcome
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown trigger
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is retried
//! - The coordinator returns an exit code instead of exiting the process
//! - Shutdown always completes once started; the grace period bounds it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Coordinator, Outcome, Phase, ShutdownTrigger, TriggerHandle};
pub use startup::{start, start_with_tunnel, StartupError};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → tower-http TraceLayer spans per request (debug)
//!
//! Consumer:
//!     → logging.rs (fmt layer, EnvFilter)
//! ```
//!
//! # Design Decisions
//! - The operator reads the log: URLs and shutdown conditions at info
//! - Denied and served requests are logged with remote host
//! - Payload contents are never logged

pub mod logging;

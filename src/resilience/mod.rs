//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! --timeout "1 minute"
//!     → timeouts.rs (parse into Timeout, arm the shutdown timer)
//!
//! Tunnel agent startup:
//!     → backoff.rs (poll the agent API with growing delays)
//! ```
//!
//! # Design Decisions
//! - Every wait has a deadline; the only open-ended wait is an explicit "never"
//! - Startup steps are never retried; only readiness polling backs off

pub mod backoff;
pub mod timeouts;

pub use timeouts::{parse_timeout, InvalidTimeoutError, Timeout};

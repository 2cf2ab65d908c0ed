//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     token.rs (draw 128 random bits once)
//!     → RouteToken
//!     → main route `/<token>` + every advertised URL
//!
//! Per request:
//!     request path == `/<token>` → main handler
//!     otherwise                  → favicon or catch-all deny
//! ```
//!
//! # Design Decisions
//! - Exactly one meaningful route per process
//! - Exact comparison only; no prefixes, no case folding
//! - The token is never regenerated

pub mod token;

pub use token::RouteToken;

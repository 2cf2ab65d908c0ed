//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → bots.rs (known crawler User-Agent? drop the connection)
//!     → favicon short-circuit (http::server)
//!     → main route `/<token>` (http::server)
//!     → catch-all deny: drop the connection (http::server)
//! ```
//!
//! # Design Decisions
//! - The unguessable route is the only credential
//! - Fail closed: anything unexpected loses its connection, never gets a 404
//! - Nothing that a scanner sees confirms a server is listening

pub mod bots;

pub use bots::{reject_bots, BotFilter};

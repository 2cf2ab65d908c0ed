//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs (bind <addr>:0, accept loop, connection limits)
//!     → connection.rs (hyper HTTP/1.1 exchange, abort/delivery markers,
//!                      lifecycle tracking)
//!     → Hand off to HTTP layer
//!
//! interfaces.rs: local IPv4 addresses → advertised URLs
//! ```
//!
//! # Design Decisions
//! - The port is always OS-assigned; there is no fixed port to scan for
//! - One request per connection so "response finished" means "connection closed"
//! - Each connection tracked so shutdown can drain in-flight responses

pub mod connection;
pub mod interfaces;
pub mod listener;

pub use connection::{ConnectionContext, ConnectionTracker};
pub use listener::{Listener, PortAllocationError};

//! Payload subsystem.
//!
//! # Data Flow
//! ```text
//! PayloadSource (inline secret | file path)
//!     → loader.rs (read & validate, fail fast before bind)
//!     → ResolvedPayload (startup copy)
//!     → PayloadLoader::current() on every served request
//!         inline: startup copy
//!         file:   re-read from disk
//! ```
//!
//! # Design Decisions
//! - Loading happens once before the listener binds; no payload, no server
//! - File-backed payloads are re-read per request so the link always serves
//!   the latest version of the file
//! - Inline secrets are fixed at startup

pub mod loader;

pub use loader::{load, DataLoadError, PayloadLoader, PayloadOrigin, ResolvedPayload};

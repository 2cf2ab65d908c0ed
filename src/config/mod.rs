//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (cli.rs)
//!     → PayloadSource, stop, timeout, public
//!
//! optional settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings
//!
//! both → ServerConfig (immutable for the life of the process)
//! ```
//!
//! # Design Decisions
//! - Config is created once and never mutated
//! - All settings have defaults so the file is optional
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, ConfigError};
pub use schema::{PayloadSource, SecuritySettings, ServerConfig, ServerSettings, Settings, TunnelSettings};

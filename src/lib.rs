//! shh: share a secret once over a short-lived HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!   cli ──▶ config ──▶ payload (fail fast) ──▶ routing (token)
//!                                                  │
//!                                                  ▼
//!   ┌────────────────────── lifecycle::startup ───────────────────────┐
//!   │  net::listener (port 0) ─▶ net::connection ─▶ http (filter chain)│
//!   │                                   │                              │
//!   │                       delivery    ▼          tunnel (optional)   │
//!   └──────────────────────▶ lifecycle::shutdown ◀── timer / signal ───┘
//!                                    │
//!                                    ▼
//!                          Outcome { exit code }
//! ```

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod payload;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod tunnel;

pub use config::ServerConfig;
pub use lifecycle::{start, Coordinator, Outcome, ShutdownTrigger};

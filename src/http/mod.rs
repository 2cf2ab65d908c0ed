//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::connection, hyper HTTP/1.1, no keep-alive)
//!     → server.rs (Axum router + filter chain)
//!         → security::bots (drop crawlers)
//!         → /favicon.ico (empty 200)
//!         → /<token> (payload page)
//!         → anything else (drop)
//!     → response.rs (Abort / Delivered markers, page rendering)
//!     → back to net::connection, which acts on the markers
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use response::{Abort, Delivered, RequestHandlingError, SecretPage};
pub use server::{build_router, AppState};

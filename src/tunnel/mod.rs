//! Public tunnel subsystem.
//!
//! # Data Flow
//! ```text
//! --public
//!     → Tunnel::connect(local_port)   (before URLs are reported)
//!     → public base URL + /<token>    (advertised with the LAN URLs)
//!
//! shutdown
//!     → Tunnel::disconnect()          (awaited, before the listener closes)
//! ```
//!
//! # Design Decisions
//! - The relay itself is opaque; only connect/disconnect are modeled
//! - disconnect is idempotent and safe without a prior connect
//! - Connect failures are fatal at startup; disconnect failures are only logged

pub mod ngrok;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use ngrok::NgrokTunnel;

/// Which tunnel operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelPhase {
    Connect,
    Disconnect,
}

impl fmt::Display for TunnelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelPhase::Connect => write!(f, "connect"),
            TunnelPhase::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Errors raised by a tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The agent process could not be started.
    #[error("failed to launch tunnel agent `{binary}`")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client for the agent API could not be built.
    #[error("failed to build tunnel agent API client")]
    Client(#[source] reqwest::Error),

    /// The agent exited before publishing a tunnel.
    #[error("tunnel agent exited early ({status})")]
    AgentExited { status: String },

    /// No tunnel showed up within the connect timeout.
    #[error("no public tunnel was published within {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The agent published an address that is not a URL.
    #[error("tunnel agent reported an invalid public URL `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Stopping the agent failed.
    #[error("failed to stop tunnel agent")]
    Disconnect(#[source] std::io::Error),
}

impl TunnelError {
    pub fn phase(&self) -> TunnelPhase {
        match self {
            TunnelError::Disconnect(_) => TunnelPhase::Disconnect,
            _ => TunnelPhase::Connect,
        }
    }
}

/// Exposes a local port under a public URL.
#[async_trait]
pub trait Tunnel: Send {
    /// Open the tunnel and return its public base URL.
    async fn connect(&mut self, local_port: u16) -> Result<Url, TunnelError>;

    /// Close the tunnel. Safe to call repeatedly or without a prior connect.
    async fn disconnect(&mut self) -> Result<(), TunnelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases() {
        let err = TunnelError::ConnectTimeout(std::time::Duration::from_secs(1));
        assert_eq!(err.phase(), TunnelPhase::Connect);

        let err = TunnelError::Disconnect(std::io::Error::other("gone"));
        assert_eq!(err.phase(), TunnelPhase::Disconnect);
        assert_eq!(err.phase().to_string(), "disconnect");
    }
}

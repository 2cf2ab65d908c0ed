//! Configuration schema definitions.
//!
//! `ServerConfig` is built once from the command line. `Settings` holds the
//! operational knobs that may come from a TOML file; all of its fields have
//! defaults so an absent or partial file is fine.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::resilience::Timeout;

/// Where the data to share comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// Literal secret given on the command line.
    Inline(String),
    /// File whose contents are served.
    File(PathBuf),
}

impl PayloadSource {
    /// Build a source from the optional positional secret and `--file`.
    ///
    /// With neither present the source is an empty inline secret, which the
    /// loader reports as missing data.
    pub fn from_parts(secret: Option<String>, file: Option<PathBuf>) -> Option<Self> {
        match (secret, file) {
            (Some(_), Some(_)) => None,
            (_, Some(path)) => Some(PayloadSource::File(path)),
            (secret, None) => Some(PayloadSource::Inline(secret.unwrap_or_default())),
        }
    }
}

/// Immutable per-run configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub payload_source: PayloadSource,
    pub stop_on_first_request: bool,
    pub timeout: Timeout,
    pub public: bool,
    pub settings: Settings,
}

impl ServerConfig {
    /// Config with default settings, stop-after-first-request and a one minute timeout.
    pub fn new(payload_source: PayloadSource) -> Self {
        Self {
            payload_source,
            stop_on_first_request: true,
            timeout: Timeout::from_millis(60_000),
            public: false,
            settings: Settings::default(),
        }
    }
}

/// Root of the settings file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Listener settings.
    pub server: ServerSettings,

    /// Public tunnel agent settings.
    pub tunnel: TunnelSettings,

    /// Request filtering settings.
    pub security: SecuritySettings,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind; the port is always chosen by the OS.
    pub bind_address: IpAddr,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// How long shutdown waits for in-flight responses, in milliseconds.
    pub grace_period_ms: u64,

    /// Deadline for a client to send its request headers, in seconds.
    pub header_read_timeout_secs: u64,
}

impl ServerSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_connections: 64,
            grace_period_ms: 1_000,
            header_read_timeout_secs: 10,
        }
    }
}

/// Tunnel agent settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    /// Agent executable, looked up on `PATH` unless absolute.
    pub binary: String,

    /// Address of the agent's local inspection API.
    pub api_address: String,

    /// Auth token passed to the agent; the agent's own config is used when absent.
    pub authtoken: Option<String>,

    /// How long to wait for the agent to publish a tunnel.
    pub connect_timeout_secs: u64,
}

impl TunnelSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            binary: "ngrok".to_string(),
            api_address: "127.0.0.1:4040".to_string(),
            authtoken: None,
            connect_timeout_secs: 20,
        }
    }
}

/// Request filtering settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecuritySettings {
    /// User-Agent patterns rejected in addition to the built-in crawler list.
    pub extra_bot_patterns: Vec<String>,
}

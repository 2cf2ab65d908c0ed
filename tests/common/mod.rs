//! Shared utilities for integration tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shh::config::{PayloadSource, ServerConfig};
use shh::resilience::Timeout;
use shh::tunnel::{Tunnel, TunnelError};
use shh::Coordinator;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

/// Loopback-bound config with a short grace period.
pub fn config(source: PayloadSource, stop: bool, timeout: Timeout) -> ServerConfig {
    let mut config = ServerConfig::new(source);
    config.stop_on_first_request = stop;
    config.timeout = timeout;
    config.settings.server.bind_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.settings.server.grace_period_ms = 200;
    config
}

/// Client without connection reuse or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn local_addr(coordinator: &Coordinator) -> SocketAddr {
    coordinator.local_addr().expect("listener bound")
}

pub fn base_url(coordinator: &Coordinator) -> String {
    format!("http://{}", local_addr(coordinator))
}

pub fn route_url(coordinator: &Coordinator) -> String {
    format!("{}{}", base_url(coordinator), coordinator.route().path())
}

/// True if something is still accepting on `addr`.
pub async fn is_listening(addr: SocketAddr) -> bool {
    tokio::net::TcpStream::connect(addr).await.is_ok()
}

/// True if an HTTP request to `addr` is answered within 200ms.
pub async fn answers_http(addr: SocketAddr) -> bool {
    let Ok(mut stream) = tokio::net::TcpStream::connect(addr).await else {
        return false;
    };
    let request = b"GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n";
    if stream.write_all(request).await.is_err() {
        return false;
    }
    let mut buf = [0u8; 16];
    matches!(
        tokio::time::timeout(Duration::from_millis(200), stream.read(&mut buf)).await,
        Ok(Ok(n)) if n > 0
    )
}

/// What a `RecordingTunnel` saw.
#[derive(Debug, Default, Clone)]
pub struct TunnelLog {
    pub events: Vec<&'static str>,
    /// Whether the local server answered HTTP while the tunnel was connecting.
    pub answered_during_connect: Option<bool>,
    /// Whether the listener still accepted connections when disconnect ran.
    pub listening_at_disconnect: Option<bool>,
}

/// Fake relay that records calls instead of opening anything.
pub struct RecordingTunnel {
    log: Arc<Mutex<TunnelLog>>,
    fail_connect: bool,
    port: Option<u16>,
}

impl RecordingTunnel {
    pub fn new(fail_connect: bool) -> (Self, Arc<Mutex<TunnelLog>>) {
        let log = Arc::new(Mutex::new(TunnelLog::default()));
        let tunnel = Self {
            log: Arc::clone(&log),
            fail_connect,
            port: None,
        };
        (tunnel, log)
    }
}

#[async_trait]
impl Tunnel for RecordingTunnel {
    async fn connect(&mut self, local_port: u16) -> Result<Url, TunnelError> {
        self.port = Some(local_port);
        let answered =
            answers_http(SocketAddr::from((Ipv4Addr::LOCALHOST, local_port))).await;
        {
            let mut log = self.log.lock().unwrap();
            log.events.push("connect");
            log.answered_during_connect = Some(answered);
        }
        if self.fail_connect {
            return Err(TunnelError::ConnectTimeout(Duration::from_millis(1)));
        }
        Ok(Url::parse("https://relay.example").unwrap())
    }

    async fn disconnect(&mut self) -> Result<(), TunnelError> {
        let listening = match self.port {
            Some(port) => Some(is_listening(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await),
            None => None,
        };
        let mut log = self.log.lock().unwrap();
        log.events.push("disconnect");
        log.listening_at_disconnect = listening;
        Ok(())
    }
}

//! Ephemeral TCP listener with backpressure.
//!
//! # Responsibilities
//! - Bind to an OS-assigned port on the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Stop accepting (and release the port) when told to close

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::ServerSettings;
use crate::net::connection::{serve_connection, ConnectionContext, ConnectionTracker};

/// Could not obtain a listening port.
#[derive(Debug)]
pub struct PortAllocationError {
    pub address: IpAddr,
    pub source: std::io::Error,
}

impl std::fmt::Display for PortAllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to allocate a port on {}", self.address)
    }
}

impl std::error::Error for PortAllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A bounded TCP listener on an ephemeral port.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind `(bind_address, 0)` and let the OS pick the port.
    pub async fn bind(settings: &ServerSettings) -> Result<Self, PortAllocationError> {
        let address = settings.bind_address;
        let allocation_error = |source| PortAllocationError { address, source };

        let listener = TcpListener::bind(SocketAddr::new(address, 0))
            .await
            .map_err(allocation_error)?;
        let local_addr = listener.local_addr().map_err(allocation_error)?;

        tracing::debug!(
            address = %local_addr,
            max_connections = settings.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            local_addr,
            connection_limit: Arc::new(Semaphore::new(settings.max_connections)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept a connection once a connection slot is free.
    async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let (stream, peer) = self.inner.accept().await?;

        tracing::trace!(
            peer_addr = %peer,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, peer, permit))
    }

    /// Run the accept loop until `close` fires; the port is released when it returns.
    pub fn spawn(
        self,
        ctx: ConnectionContext,
        tracker: ConnectionTracker,
        mut close: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = close.recv() => break,
                    accepted = self.accept() => match accepted {
                        Ok((stream, peer, permit)) => {
                            let guard = tracker.track();
                            let ctx = ctx.clone();
                            tokio::spawn(async move {
                                serve_connection(stream, peer, ctx, guard).await;
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                    },
                }
            }

            tracing::debug!(address = %self.local_addr, "Listener closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PayloadSource, ServerConfig};
    use crate::lifecycle::Coordinator;
    use crate::routing::RouteToken;
    use std::net::Ipv4Addr;

    fn settings(address: IpAddr) -> ServerSettings {
        ServerSettings {
            bind_address: address,
            ..ServerSettings::default()
        }
    }

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let listener = Listener::bind(&settings(Ipv4Addr::LOCALHOST.into())).await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        assert!(listener.local_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn foreign_address_fails_to_bind() {
        // TEST-NET-1 is never assigned to a local interface
        let address = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        let err = Listener::bind(&settings(address)).await.err().unwrap();
        assert_eq!(err.address, address);
        assert_eq!(err.to_string(), "failed to allocate a port on 192.0.2.1");
    }

    #[tokio::test]
    async fn close_releases_the_port() {
        let listener = Listener::bind(&settings(Ipv4Addr::LOCALHOST.into())).await.unwrap();
        let addr = listener.local_addr();
        let config = ServerConfig::new(PayloadSource::Inline("x".into()));
        let coordinator = Coordinator::new(&config, RouteToken::generate());
        let ctx = ConnectionContext {
            router: axum::Router::new(),
            triggers: coordinator.trigger_handle(),
            header_read_timeout: Duration::from_secs(1),
        };
        let (close_tx, close_rx) = broadcast::channel(1);

        let task = listener.spawn(ctx, ConnectionTracker::new(), close_rx);
        assert!(TcpStream::connect(addr).await.is_ok());

        close_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }
}

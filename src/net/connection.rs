//! Per-connection serving and lifecycle tracking.
//!
//! # Responsibilities
//! - Serve one HTTP/1.1 exchange per connection (keep-alive off)
//! - Turn `Abort` responses into a dropped connection
//! - Report a delivery only after its response has been flushed
//! - Track open connections so shutdown can drain them

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tower::ServiceExt;

use crate::http::request::{describe_user_agent, remote_host};
use crate::http::response::{Abort, Delivered};
use crate::lifecycle::shutdown::{ShutdownTrigger, TriggerHandle};

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Service error that makes hyper close the connection without a response.
#[derive(Debug, Error)]
#[error("connection aborted by request filter")]
pub struct ConnectionAborted;

/// Counts open connections so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new connection. The returned guard releases it on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|n| *n += 1);
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until every tracked connection has closed, up to `grace`.
    ///
    /// Returns `false` if connections were still open when the grace period ran out.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let mut rx = self.active.subscribe();
        tokio::time::timeout(grace, rx.wait_for(|n| *n == 0))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Everything a connection task needs.
#[derive(Clone)]
pub struct ConnectionContext {
    pub router: Router,
    pub triggers: TriggerHandle,
    pub header_read_timeout: Duration,
}

/// Who received the payload.
#[derive(Debug, Clone)]
struct Delivery {
    remote_host: String,
    user_agent: String,
}

/// Serve a single connection to completion.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: ConnectionContext,
    guard: ConnectionGuard,
) {
    let delivered: Arc<OnceLock<Delivery>> = Arc::new(OnceLock::new());

    let service = {
        let router = ctx.router.clone();
        let delivered = Arc::clone(&delivered);
        service_fn(move |request: Request<Incoming>| {
            let router = router.clone();
            let delivered = Arc::clone(&delivered);
            async move { dispatch(router, request, peer, &delivered).await }
        })
    };

    let result = http1::Builder::new()
        .keep_alive(false)
        .timer(TokioTimer::new())
        .header_read_timeout(ctx.header_read_timeout)
        .serve_connection(TokioIo::new(stream), service)
        .await;

    match result {
        Ok(()) => {
            // The connection future only resolves after the response was written out
            if let Some(delivery) = delivered.get() {
                tracing::info!(
                    connection_id = %guard.id(),
                    remote_host = %delivery.remote_host,
                    user_agent = %delivery.user_agent,
                    "Request served"
                );
                ctx.triggers.notify(ShutdownTrigger::RequestCompleted);
            }
        }
        Err(e) => {
            tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection dropped");
        }
    }
}

async fn dispatch(
    router: Router,
    request: Request<Incoming>,
    peer: SocketAddr,
    delivered: &OnceLock<Delivery>,
) -> Result<Response<Body>, ConnectionAborted> {
    let mut request = request.map(Body::new);
    request.extensions_mut().insert(ConnectInfo(peer));

    let delivery = Delivery {
        remote_host: remote_host(request.headers(), Some(peer)),
        user_agent: describe_user_agent(request.headers()),
    };

    let response = match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    if response.extensions().get::<Abort>().is_some() {
        return Err(ConnectionAborted);
    }
    if response.extensions().get::<Delivered>().is_some() {
        let _ = delivered.set(delivery);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_when_drained() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn wait_idle_gives_up_after_grace() {
        let tracker = ConnectionTracker::new();
        let _guard = tracker.track();
        assert!(!tracker.wait_idle(Duration::from_millis(20)).await);
    }
}

//! Shutdown coordination.
//!
//! # States
//! ```text
//! Starting → Serving → Stopping → Stopped
//!     │                    ▲
//!     └────────────────────┘  (fatal startup error after the listener bound)
//! ```
//!
//! # Triggers
//! - Timeout: the armed deadline passed
//! - RequestCompleted: a delivery finished flushing and `stop` is set
//! - Interrupted: SIGINT/SIGTERM
//! - FatalStartupError: startup failed after resources were acquired
//!
//! The coordinator is the only owner of `ServerState`. Everyone else reaches
//! it through `TriggerHandle::notify`. The first trigger to arrive wins; the
//! stop sequence is guarded so it runs at most once.
//!
//! # Stop sequence
//! 1. Disconnect the tunnel (errors logged, never fatal)
//! 2. Close the listener and join the accept loop
//! 3. Wait for in-flight connections, bounded by the grace period

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::config::ServerConfig;
use crate::net::ConnectionTracker;
use crate::resilience::Timeout;
use crate::routing::RouteToken;
use crate::tunnel::{Tunnel, TunnelError};

/// Event that starts the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Timeout,
    RequestCompleted,
    Interrupted,
    FatalStartupError,
}

impl ShutdownTrigger {
    pub fn exit_code(&self) -> u8 {
        match self {
            ShutdownTrigger::FatalStartupError => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownTrigger::Timeout => "timeout",
            ShutdownTrigger::RequestCompleted => "first request",
            ShutdownTrigger::Interrupted => "signal",
            ShutdownTrigger::FatalStartupError => "startup error",
        };
        f.write_str(name)
    }
}

/// Lifecycle phase of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Serving,
    Stopping,
    Stopped,
}

/// Terminal result handed back to the process entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub trigger: ShutdownTrigger,
    pub exit_code: u8,
}

impl From<ShutdownTrigger> for Outcome {
    fn from(trigger: ShutdownTrigger) -> Self {
        Self {
            trigger,
            exit_code: trigger.exit_code(),
        }
    }
}

/// Sending side of the trigger channel.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::UnboundedSender<ShutdownTrigger>,
}

impl TriggerHandle {
    /// Report a trigger. Ignored once the coordinator is gone.
    pub fn notify(&self, trigger: ShutdownTrigger) {
        if self.tx.send(trigger).is_err() {
            tracing::trace!(trigger = %trigger, "Coordinator already finished");
        }
    }
}

/// Signal telling the accept loop to stop and release the port.
#[derive(Debug)]
pub struct ListenerClose {
    tx: broadcast::Sender<()>,
}

impl ListenerClose {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for ListenerClose {
    fn default() -> Self {
        Self::new()
    }
}

/// Resources owned by the coordinator.
pub struct ServerState {
    phase: Phase,
    local_addr: Option<SocketAddr>,
    urls: Vec<Url>,
    tunnel: Option<Box<dyn Tunnel>>,
    listener_close: ListenerClose,
    accept_task: Option<JoinHandle<()>>,
    connections: ConnectionTracker,
}

impl ServerState {
    fn new() -> Self {
        Self {
            phase: Phase::Starting,
            local_addr: None,
            urls: Vec::new(),
            tunnel: None,
            listener_close: ListenerClose::new(),
            accept_task: None,
            connections: ConnectionTracker::new(),
        }
    }
}

/// Owns the server state and runs the shutdown state machine.
pub struct Coordinator {
    state: ServerState,
    route: RouteToken,
    triggers: mpsc::UnboundedReceiver<ShutdownTrigger>,
    handle: TriggerHandle,
    timeout: Timeout,
    deadline: Option<Instant>,
    stop_on_first_request: bool,
    grace_period: Duration,
}

impl Coordinator {
    pub fn new(config: &ServerConfig, route: RouteToken) -> Self {
        let (tx, triggers) = mpsc::unbounded_channel();
        Self {
            state: ServerState::new(),
            route,
            triggers,
            handle: TriggerHandle { tx },
            timeout: config.timeout.clone(),
            deadline: None,
            stop_on_first_request: config.stop_on_first_request,
            grace_period: config.settings.server.grace_period(),
        }
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        self.handle.clone()
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.state.connections.clone()
    }

    pub fn listener_close(&self) -> broadcast::Receiver<()> {
        self.state.listener_close.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn route(&self) -> &RouteToken {
        &self.route
    }

    pub fn urls(&self) -> &[Url] {
        &self.state.urls
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.local_addr
    }

    /// Take ownership of a bound listener's accept loop.
    pub fn attach_listener(&mut self, local_addr: SocketAddr, accept_task: JoinHandle<()>) {
        self.state.local_addr = Some(local_addr);
        self.state.accept_task = Some(accept_task);
    }

    /// Take ownership of `tunnel` and connect it to `local_port`.
    ///
    /// The tunnel is kept even when connecting fails so the stop sequence
    /// still disconnects it.
    pub async fn connect_tunnel(
        &mut self,
        tunnel: Box<dyn Tunnel>,
        local_port: u16,
    ) -> Result<Url, TunnelError> {
        let tunnel = self.state.tunnel.insert(tunnel);
        let public_url = tunnel.connect(local_port).await?;
        tracing::debug!(public_url = %public_url, "Public tunnel connected");
        Ok(public_url)
    }

    /// Enter `Serving`: arm the deadline and tell the operator where to go.
    pub fn begin_serving(&mut self, urls: Vec<Url>) {
        self.state.urls = urls;
        self.state.phase = Phase::Serving;
        self.deadline = self.timeout.as_duration().map(|d| Instant::now() + d);

        match self.state.urls.as_slice() {
            [url] => tracing::info!("Server available at: {}", url),
            urls => {
                tracing::info!("Server available at:");
                for url in urls {
                    tracing::info!("- {}", url);
                }
            }
        }

        let conditions = describe_conditions(self.stop_on_first_request, &self.timeout);
        if self.stop_on_first_request || !self.timeout.is_infinite() {
            tracing::info!("{}", conditions);
        } else {
            tracing::warn!("{}", conditions);
        }
    }

    /// Serve until a trigger fires, then run the stop sequence.
    pub async fn run(self) -> Outcome {
        self.run_until(crate::lifecycle::signals::interrupt()).await
    }

    /// Like [`run`](Self::run), with `interrupt` standing in for OS signals.
    pub async fn run_until<F>(mut self, interrupt: F) -> Outcome
    where
        F: Future<Output = ()>,
    {
        let trigger = {
            // Dropped with this block, so a losing timer can never fire later
            let expiry = expire_at(self.deadline);
            tokio::pin!(expiry);
            tokio::pin!(interrupt);

            loop {
                tokio::select! {
                    _ = &mut expiry => {
                        tracing::info!(timeout = %self.timeout, "Timeout reached");
                        break ShutdownTrigger::Timeout;
                    }
                    _ = &mut interrupt => break ShutdownTrigger::Interrupted,
                    Some(trigger) = self.triggers.recv() => match trigger {
                        ShutdownTrigger::RequestCompleted if !self.stop_on_first_request => {
                            tracing::debug!("Delivery recorded, server stays online");
                        }
                        trigger => break trigger,
                    },
                }
            }
        };

        self.stop(trigger).await.unwrap_or_else(|| trigger.into())
    }

    /// Run the stop sequence for `trigger`.
    ///
    /// Returns `None` without doing anything if a stop has already begun.
    pub async fn stop(&mut self, trigger: ShutdownTrigger) -> Option<Outcome> {
        if !matches!(self.state.phase, Phase::Starting | Phase::Serving) {
            tracing::debug!(trigger = %trigger, phase = ?self.state.phase, "Shutdown already in progress");
            return None;
        }
        self.state.phase = Phase::Stopping;
        tracing::info!(trigger = %trigger, "Shutting down");

        if let Some(mut tunnel) = self.state.tunnel.take() {
            if let Err(e) = tunnel.disconnect().await {
                tracing::warn!(phase = %e.phase(), error = %e, "Failed to close tunnel");
            }
        }

        self.state.listener_close.trigger();
        if let Some(accept_task) = self.state.accept_task.take() {
            if let Err(e) = accept_task.await {
                tracing::warn!(error = %e, "Accept loop ended abnormally");
            }
        }

        if !self.state.connections.wait_idle(self.grace_period).await {
            tracing::warn!(
                open_connections = self.state.connections.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        self.state.phase = Phase::Stopped;
        tracing::info!("Exiting");
        Some(trigger.into())
    }
}

async fn expire_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Operator-facing description of when the server will go away.
pub fn describe_conditions(stop_on_first_request: bool, timeout: &Timeout) -> String {
    match (stop_on_first_request, timeout.is_infinite()) {
        (true, true) => "Server will shut down after first request.".to_string(),
        (true, false) => format!("Server will shut down after {} or first request.", timeout),
        (false, false) => format!("Server will shut down after {}.", timeout),
        (false, true) => "Server will remain online indefinitely.".to_string(),
    }
}

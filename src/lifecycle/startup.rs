//! Startup orchestration.
//!
//! # Order
//! 1. Resolve the payload (nothing binds if this fails)
//! 2. Compile the bot filter and draw the route token
//! 3. Bind an ephemeral port
//! 4. Connect the public tunnel, if requested
//! 5. Start accepting, report every URL and enter `Serving`
//!
//! Any failure is fatal. A tunnel failure first runs the coordinator's stop
//! sequence so the tunnel and the bound port are released.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, ServerConfig};
use crate::http::{build_router, AppState};
use crate::lifecycle::shutdown::{Coordinator, ShutdownTrigger};
use crate::net::interfaces::{advertised_hosts, local_urls, public_url};
use crate::net::{ConnectionContext, Listener, PortAllocationError};
use crate::payload::{DataLoadError, PayloadLoader};
use crate::resilience::InvalidTimeoutError;
use crate::routing::RouteToken;
use crate::security::BotFilter;
use crate::tunnel::{NgrokTunnel, Tunnel, TunnelError};

/// Anything that prevents the server from reaching `Serving`.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("give either a secret or --file, not both")]
    ConflictingSources,

    #[error(transparent)]
    InvalidTimeout(#[from] InvalidTimeoutError),

    #[error("failed to load data")]
    DataLoad(#[from] DataLoadError),

    #[error("invalid bot pattern")]
    BotFilter(#[from] regex::Error),

    #[error(transparent)]
    PortAllocation(#[from] PortAllocationError),

    #[error("failed to open public tunnel")]
    Tunnel(#[from] TunnelError),
}

impl StartupError {
    pub fn exit_code(&self) -> u8 {
        ShutdownTrigger::FatalStartupError.exit_code()
    }
}

/// Start serving `config`, using the ngrok agent when `public` is set.
pub async fn start(config: ServerConfig) -> Result<Coordinator, StartupError> {
    let tunnel: Option<Box<dyn Tunnel>> = if config.public {
        Some(Box::new(NgrokTunnel::new(config.settings.tunnel.clone())?))
    } else {
        None
    };
    start_with_tunnel(config, tunnel).await
}

/// Start serving `config` with a caller-provided tunnel.
///
/// The tunnel is only used when `config.public` is set.
pub async fn start_with_tunnel(
    config: ServerConfig,
    tunnel: Option<Box<dyn Tunnel>>,
) -> Result<Coordinator, StartupError> {
    let payload = PayloadLoader::new(config.payload_source.clone()).await?;
    let bots = BotFilter::new(&config.settings.security.extra_bot_patterns)?;
    let route = RouteToken::generate();
    let mut coordinator = Coordinator::new(&config, route.clone());

    let listener = Listener::bind(&config.settings.server).await?;
    let local_addr = listener.local_addr();

    let hosts = advertised_hosts(config.settings.server.bind_address);
    let mut urls = local_urls(&hosts, local_addr.port(), &route);

    if let Some(tunnel) = tunnel.filter(|_| config.public) {
        let connected = coordinator
            .connect_tunnel(tunnel, local_addr.port())
            .await
            .and_then(|base| {
                public_url(&base, &route).map_err(|source| TunnelError::InvalidUrl {
                    url: base.to_string(),
                    source,
                })
            });

        match connected {
            Ok(url) => urls.push(url),
            Err(e) => {
                coordinator.stop(ShutdownTrigger::FatalStartupError).await;
                drop(listener);
                return Err(e.into());
            }
        }
    }

    // Connections made while the tunnel was coming up wait in the backlog until now
    let state = AppState {
        payload: Arc::new(payload),
        stop_on_first_request: config.stop_on_first_request,
    };
    let ctx = ConnectionContext {
        router: build_router(&route, state, Arc::new(bots)),
        triggers: coordinator.trigger_handle(),
        header_read_timeout: config.settings.server.header_read_timeout(),
    };
    let accept_task = listener.spawn(ctx, coordinator.connections(), coordinator.listener_close());
    coordinator.attach_listener(local_addr, accept_task);

    coordinator.begin_serving(urls);
    Ok(coordinator)
}

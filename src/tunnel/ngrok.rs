//! Tunnel backed by the `ngrok` agent.
//!
//! The agent is started as a child process (`ngrok http <port>`). Once it
//! is up it lists its tunnels on a local inspection API; connect polls that
//! API until a tunnel forwarding to our port appears.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::{Child, Command};
use url::Url;

use crate::config::TunnelSettings;
use crate::resilience::backoff::calculate_backoff;
use crate::tunnel::{Tunnel, TunnelError};

const POLL_BASE_MS: u64 = 100;
const POLL_MAX_MS: u64 = 1_000;

#[derive(Debug, Deserialize)]
struct TunnelList {
    tunnels: Vec<PublishedTunnel>,
}

#[derive(Debug, Deserialize)]
struct PublishedTunnel {
    public_url: String,
    #[serde(default)]
    proto: String,
    config: PublishedTunnelConfig,
}

#[derive(Debug, Deserialize)]
struct PublishedTunnelConfig {
    addr: String,
}

/// Public URL of the tunnel forwarding to `port`, preferring https.
fn find_public_url(list: &TunnelList, port: u16) -> Option<&str> {
    let suffix = format!(":{}", port);
    let mut matching = list
        .tunnels
        .iter()
        .filter(|t| t.config.addr.trim_end_matches('/').ends_with(&suffix));

    let first = matching.next()?;
    if first.proto == "https" {
        return Some(first.public_url.as_str());
    }
    Some(
        matching
            .find(|t| t.proto == "https")
            .map(|t| t.public_url.as_str())
            .unwrap_or(first.public_url.as_str()),
    )
}

/// Runs and supervises an `ngrok` agent process.
pub struct NgrokTunnel {
    settings: TunnelSettings,
    client: reqwest::Client,
    agent: Option<Child>,
}

impl NgrokTunnel {
    pub fn new(settings: TunnelSettings) -> Result<Self, TunnelError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(TunnelError::Client)?;

        Ok(Self {
            settings,
            client,
            agent: None,
        })
    }

    fn spawn_agent(&self, local_port: u16) -> Result<Child, TunnelError> {
        let mut command = Command::new(&self.settings.binary);
        command
            .arg("http")
            .arg(local_port.to_string())
            .arg("--log")
            .arg("stdout")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(token) = &self.settings.authtoken {
            command.arg("--authtoken").arg(token);
        }

        command.spawn().map_err(|source| TunnelError::Spawn {
            binary: self.settings.binary.clone(),
            source,
        })
    }

    /// Poll the agent API until our tunnel is listed.
    async fn wait_for_tunnel(&mut self, local_port: u16) -> Result<String, TunnelError> {
        let endpoint = format!("http://{}/api/tunnels", self.settings.api_address);
        let mut attempt = 0;

        loop {
            if let Some(agent) = self.agent.as_mut() {
                match agent.try_wait() {
                    Ok(Some(status)) => {
                        return Err(TunnelError::AgentExited {
                            status: status.to_string(),
                        })
                    }
                    Ok(None) => {}
                    Err(e) => {
                        return Err(TunnelError::AgentExited {
                            status: e.to_string(),
                        })
                    }
                }
            }

            match self.client.get(&endpoint).send().await {
                Ok(response) => match response.json::<TunnelList>().await {
                    Ok(list) => {
                        if let Some(url) = find_public_url(&list, local_port) {
                            return Ok(url.to_string());
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Unexpected tunnel API response"),
                },
                Err(e) => tracing::trace!(error = %e, "Tunnel API not ready"),
            }

            attempt += 1;
            tokio::time::sleep(calculate_backoff(attempt, POLL_BASE_MS, POLL_MAX_MS)).await;
        }
    }
}

#[async_trait]
impl Tunnel for NgrokTunnel {
    async fn connect(&mut self, local_port: u16) -> Result<Url, TunnelError> {
        self.disconnect().await?;

        self.agent = Some(self.spawn_agent(local_port)?);
        tracing::debug!(binary = %self.settings.binary, port = local_port, "Tunnel agent started");

        let timeout = self.settings.connect_timeout();
        let public_url = tokio::time::timeout(timeout, self.wait_for_tunnel(local_port))
            .await
            .map_err(|_| TunnelError::ConnectTimeout(timeout))??;

        Url::parse(&public_url).map_err(|source| TunnelError::InvalidUrl {
            url: public_url,
            source,
        })
    }

    async fn disconnect(&mut self) -> Result<(), TunnelError> {
        let Some(mut agent) = self.agent.take() else {
            return Ok(());
        };

        // An agent that already exited has been reaped and cannot be killed
        if let Ok(Some(_)) = agent.try_wait() {
            return Ok(());
        }

        agent.kill().await.map_err(TunnelError::Disconnect)?;
        tracing::debug!("Tunnel agent stopped");
        Ok(())
    }
}

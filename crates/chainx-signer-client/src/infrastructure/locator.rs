//! Finding a running signer.
//!
//! A signer listens on one of a few well-known local ports.  Which one
//! depends on what else was already bound when it started, so the client
//! probes them in order and takes the first that accepts a TCP connection.
//! Each probe is bounded by a short timeout.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::application::ports::{SignerTarget, TransportLocator};
use crate::domain::config::ClientConfig;

/// Probes `host` on each port in order.
#[derive(Debug, Clone)]
pub struct PortScanLocator {
    host: String,
    ports: Vec<u16>,
    path: String,
    probe_timeout: Duration,
}

impl PortScanLocator {
    pub fn new(host: impl Into<String>, ports: Vec<u16>, path: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            ports,
            path: path.into(),
            probe_timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.ports.clone(),
            config.socket_path.clone(),
            config.probe_timeout,
        )
    }
}

#[async_trait]
impl TransportLocator for PortScanLocator {
    async fn locate(&self) -> Option<SignerTarget> {
        for &port in &self.ports {
            match timeout(self.probe_timeout, TcpStream::connect((self.host.as_str(), port))).await {
                Ok(Ok(_probe)) => {
                    debug!("signer found on {}:{port}", self.host);
                    return Some(SignerTarget::websocket(&self.host, port, &self.path));
                }
                Ok(Err(e)) => debug!("nothing on {}:{port}: {e}", self.host),
                Err(_) => debug!("probe of {}:{port} timed out", self.host),
            }
        }
        None
    }
}

/// Always answers with the same target (or with none).
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    target: Option<SignerTarget>,
}

impl StaticLocator {
    pub fn new(target: SignerTarget) -> Self {
        Self { target: Some(target) }
    }

    /// A locator that never finds a signer.
    pub fn none() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransportLocator for StaticLocator {
    async fn locate(&self) -> Option<SignerTarget> {
        self.target.clone()
    }
}

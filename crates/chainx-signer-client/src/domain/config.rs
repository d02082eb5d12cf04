//! Runtime configuration for a signer client.
//!
//! # Defaults
//!
//! | Field                    | Default                                     |
//! |--------------------------|---------------------------------------------|
//! | `plugin`                 | `chainx-signer-link`                        |
//! | `hostname`               | none (origin falls back to `plugin`)        |
//! | `host`                   | `127.0.0.1`                                 |
//! | `ports`                  | `10013`, `10014`, `10015`                   |
//! | `socket_path`            | `/socket.io/?EIO=3&transport=websocket`     |
//! | `probe_timeout`          | 300 ms                                      |
//! | `open_timeout`           | 3 s                                         |
//! | `reconnect_delay`        | 1 s                                         |
//! | `auto_reconnect`         | `true`                                      |
//! | `max_reconnect_attempts` | unbounded                                   |
//! | `key_file`               | platform config dir, `appkey.toml`          |

use std::path::PathBuf;
use std::time::Duration;

/// Ports a signer listens on, probed in order.
pub const DEFAULT_PORTS: [u16; 3] = [10013, 10014, 10015];

/// Everything a [`SignerClient`](crate::application::signer_client::SignerClient)
/// and its default adapters need.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Name this application presents to the signer.
    pub plugin: String,
    /// Hostname of the hosting context, used to derive the origin.
    pub hostname: Option<String>,
    /// Host the signer listens on.
    pub host: String,
    pub ports: Vec<u16>,
    /// Path (and query) of the WebSocket endpoint.
    pub socket_path: String,
    /// How long a single port probe may take.
    pub probe_timeout: Duration,
    /// How long opening the WebSocket may take.
    pub open_timeout: Duration,
    pub reconnect_delay: Duration,
    pub auto_reconnect: bool,
    /// `None` retries until a link succeeds or the client is disconnected.
    pub max_reconnect_attempts: Option<u32>,
    /// `None` uses the platform default location.
    pub key_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            plugin: "chainx-signer-link".to_string(),
            hostname: None,
            host: "127.0.0.1".to_string(),
            ports: DEFAULT_PORTS.to_vec(),
            socket_path: "/socket.io/?EIO=3&transport=websocket".to_string(),
            probe_timeout: Duration::from_millis(300),
            open_timeout: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(1),
            auto_reconnect: true,
            max_reconnect_attempts: None,
            key_file: None,
        }
    }
}

//! Infrastructure layer: the concrete adapters behind the application ports.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `chainx_signer_core`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! # Sub-modules
//!
//! - **`locator`** – [`PortScanLocator`](locator::PortScanLocator) probes the
//!   signer's well-known ports; `StaticLocator` answers with a fixed target.
//! - **`transport`** – the WebSocket transport and its in-memory mock.
//! - **`storage`** – where the persisted appkey lives.
//! - **`crypto`** – OS entropy, SHA-256, and the origin provider.

pub mod crypto;
pub mod locator;
pub mod storage;
pub mod transport;

use std::sync::Arc;

use crate::application::ports::ClientPorts;
use crate::domain::config::ClientConfig;

use self::crypto::{OsEntropy, Sha256Digest, StaticOrigin};
use self::locator::PortScanLocator;
use self::storage::{FileKeyStore, StorageError};
use self::transport::WsTransport;

/// Wires the production adapters for `config`.
///
/// # Errors
///
/// [`StorageError::NoPlatformConfigDir`] when no key file path is configured
/// and the platform config directory cannot be determined.
pub fn production_ports(config: &ClientConfig) -> Result<ClientPorts, StorageError> {
    let key_store = match &config.key_file {
        Some(path) => FileKeyStore::new(path),
        None => FileKeyStore::at_default_location()?,
    };
    Ok(ClientPorts {
        locator: Arc::new(PortScanLocator::from_config(config)),
        transport: Arc::new(WsTransport::new(config.open_timeout)),
        key_store: Arc::new(key_store),
        entropy: Arc::new(OsEntropy),
        digest: Arc::new(Sha256Digest),
        origin: Arc::new(StaticOrigin::new(config.hostname.clone())),
    })
}

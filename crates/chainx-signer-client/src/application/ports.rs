//! Collaborator ports: the traits the session logic drives.
//!
//! The application layer never opens a socket or touches a file itself.  It
//! talks to the outside world through the traits below, and the
//! infrastructure layer provides the implementations (WebSocket, TOML key
//! file, OS entropy, SHA-256).  Tests swap in the in-memory ones.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors surfaced to callers of the client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// The signer declined pairing, or the handshake never completed.
    #[error("the user did not allow this app to connect to their signer")]
    NotPaired,

    /// Sending on a closed or failed channel, or the channel died mid-call.
    #[error("network error: {0}")]
    Network(String),

    /// The signer answered the call with an error value.
    #[error("signer returned an error: {0}")]
    Remote(Value),

    /// The locator found no running signer.
    #[error("no running signer was found")]
    SignerNotFound,
}

impl ClientError {
    /// Machine-readable code carried in [`ErrorPayload::code`].
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::NotPaired => "not_paired",
            ClientError::Network(_) => "network_error",
            ClientError::Remote(_) => "remote_error",
            ClientError::SignerNotFound => "signer_not_found",
        }
    }

    /// Renders the error as the `{code, message}` shape callers expect.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// `{code, message}` error shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Errors raised by a transport channel when sending.
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("channel is closed")]
    Closed,
}

/// Errors raised by a key store when persisting a key.
#[derive(Debug, Error, PartialEq)]
pub enum KeyStoreError {
    #[error("key store write failed: {0}")]
    Write(String),
}

// ── Transport locator ─────────────────────────────────────────────────────────

/// Where a running signer can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerTarget {
    pub url: String,
}

impl SignerTarget {
    /// Builds a `ws://` target for a signer listening on `host:port`.
    pub fn websocket(host: &str, port: u16, path: &str) -> Self {
        Self {
            url: format!("ws://{host}:{port}{path}"),
        }
    }
}

/// Finds the local endpoint a signer is listening on.
#[async_trait]
pub trait TransportLocator: Send + Sync {
    /// Returns `None` when no signer is running.
    async fn locate(&self) -> Option<SignerTarget>;
}

// ── Socket transport ──────────────────────────────────────────────────────────

/// Something that happened on an open channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// One inbound text message.
    Message(String),
    /// The channel is gone; no further events follow.
    Closed,
}

/// The outbound half of an open channel.
pub trait FrameSink: Send + Sync {
    /// Queues `text` for sending.  Fails synchronously if the channel is dead.
    fn send(&self, text: String) -> Result<(), TransportError>;

    /// Closes the channel.  A [`TransportEvent::Closed`] follows on the
    /// channel's event stream.
    fn close(&self);
}

/// An open duplex channel.
pub struct OpenChannel {
    pub sink: Arc<dyn FrameSink>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens duplex text channels to a located signer.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// Returns `None` if the channel could not be opened.
    async fn open(&self, target: &SignerTarget) -> Option<OpenChannel>;
}

// ── Key store, entropy, digest, origin ────────────────────────────────────────

/// Durable storage for the persisted application key.
#[cfg_attr(test, mockall::automock)]
pub trait KeyStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, value: &str) -> Result<(), KeyStoreError>;
}

/// Cryptographically random bytes.
pub trait EntropySource: Send + Sync {
    fn random_bytes(&self, len: usize) -> Vec<u8>;
}

/// One-way hash turning an ephemeral key into its persisted form.
pub trait DigestFunction: Send + Sync {
    /// Returns the lowercase hex digest of `bytes`.
    fn hash(&self, bytes: &[u8]) -> String;
}

/// The hostname of the context the client runs in, if it has one.
pub trait OriginProvider: Send + Sync {
    fn hostname(&self) -> Option<String>;
}

/// Every collaborator a client needs, bundled for construction.
#[derive(Clone)]
pub struct ClientPorts {
    pub locator: Arc<dyn TransportLocator>,
    pub transport: Arc<dyn SocketTransport>,
    pub key_store: Arc<dyn KeyStore>,
    pub entropy: Arc<dyn EntropySource>,
    pub digest: Arc<dyn DigestFunction>,
    pub origin: Arc<dyn OriginProvider>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

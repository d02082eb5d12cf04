//! chainx-signer-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the client do? (for beginners)
//!
//! A ChainX *signer* is a desktop application that holds the user's keys.
//! Other applications never see those keys; instead they ask the signer to
//! sign things, and the signer asks its user for approval.
//!
//! This crate is the application side of that conversation:
//!
//! 1. Find the signer on one of its local ports and open a WebSocket.
//! 2. Pair: present an appkey and origin; the user approves once, after which
//!    a hash of the key is stored so later sessions skip the prompt.
//! 3. Send API calls (`chainx_account`, `chainx_sign_send`, …) and match each
//!    answer to its call by a random correlation id.
//! 4. Deliver push events (account, node and network changes, transaction
//!    status) to subscribed handlers.
//! 5. Recover on its own when the signer rotates the key or the socket drops.

/// Application layer: session logic behind collaborator ports.
pub mod application;

/// Client configuration.
pub mod domain;

/// Infrastructure layer: WebSocket, key file, entropy and digest adapters.
pub mod infrastructure;

pub use application::connection::LinkOutcome;
pub use application::ports::{ClientError, ClientPorts, ErrorPayload};
pub use application::request_registry::{ApiCall, TxStatusCallback};
pub use application::signer_client::SignerClient;
pub use domain::config::ClientConfig;

//! Application layer: the session logic of a signer client.
//!
//! # What lives here?
//!
//! - **`ports`** – the traits every outside collaborator implements, and
//!   the error type callers see.
//! - **`key_lifecycle`** – loading, rotating and promoting the appkey.
//! - **`pairing`** – the pairing handshake and its waiters.
//! - **`request_registry`** – correlated API calls and transaction-status
//!   watchers.
//! - **`state`** – the per-client state aggregate and the inbound frame
//!   dispatcher.
//! - **`connection`** – link, reader loop, disconnect, auto-reconnect.
//! - **`signer_client`** – the public facade.
//!
//! Nothing here opens a socket or a file directly; the infrastructure layer
//! supplies that through [`ports::ClientPorts`].

pub mod connection;
pub mod key_lifecycle;
pub mod pairing;
pub mod ports;
pub mod request_registry;
pub mod signer_client;
pub(crate) mod state;

//! # chainx-signer-core
//!
//! Shared library for the ChainX signer link containing the text frame codec,
//! the typed protocol payloads, and the session domain types.
//!
//! This crate has no dependencies on sockets, async runtimes, or storage.
//! Everything that touches the outside world lives in `chainx-signer-client`.
//!
//! # Architecture overview (for beginners)
//!
//! A ChainX signer is a desktop application that holds the user's keys.  A
//! client (a wallet UI, a CLI, a service) never sees those keys; instead it
//! connects to the signer over a local WebSocket, *pairs* with it, and then
//! asks it to sign transactions on the user's behalf.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`protocol`** – How text travels over the socket.  Every message is a
//!   socket.io-style frame: `42/chainx,["type", payload]`.  The codec turns
//!   that text into a typed [`Frame`] and back.
//!
//! - **`domain`** – Pure session logic with no I/O: the application key
//!   ([`AppKey`]), origin resolution, the session flags, and the
//!   [`EventRouter`] that fans push events out to subscribers.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `chainx_signer_core::Frame` instead of `chainx_signer_core::protocol::frame::Frame`.
pub use domain::appkey::AppKey;
pub use domain::event_router::{EventHandler, EventRouter, SubscriptionId};
pub use domain::origin::resolve_origin;
pub use domain::session::{PairingState, Session};
pub use protocol::correlation::correlation_id;
pub use protocol::frame::{decode_frame, encode_frame, Decoded, Frame, FrameType, ProtocolError};
pub use protocol::messages::{ApiMethod, SignerEvent};

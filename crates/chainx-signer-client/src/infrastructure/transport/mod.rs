//! Socket transports.
//!
//! - **`ws`** – [`WsTransport`], a WebSocket client built on
//!   `tokio-tungstenite`.  This is what talks to a real signer.
//! - **`mock`** – [`MockTransport`], an in-memory channel that records every
//!   frame the client sends and lets a test play the signer's side.

pub mod mock;
pub mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

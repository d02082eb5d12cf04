//! Domain module: pure session logic with no I/O.
//!
//! Nothing in here touches a socket, a file, or a clock, so every rule can be
//! exercised from plain unit tests.

pub mod appkey;
pub mod event_router;
pub mod origin;
pub mod session;

pub use appkey::{AppKey, EPHEMERAL_TAG};
pub use event_router::{dispatch, EventHandler, EventRouter, SubscriptionId};
pub use origin::resolve_origin;
pub use session::{PairingState, Session};

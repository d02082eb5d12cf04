//! Protocol module containing the frame codec, typed payloads, and correlation ids.

pub mod correlation;
pub mod frame;
pub mod messages;

pub use correlation::correlation_id;
pub use frame::{decode_frame, encode_bare_frame, encode_frame, Decoded, Frame, FrameType, ProtocolError, JOIN_FRAME};
pub use messages::*;

//! Text codec for encoding and decoding signer protocol frames.
//!
//! Wire format:
//! ```text
//! 40/chainx                       join the "chainx" channel (no payload)
//! 42/chainx,["<type>",<payload>]  data frame
//! 42/chainx,["<type>"]            data frame without payload
//! ```
//!
//! The framing is borrowed from socket.io: `40` opens a namespace, `42`
//! carries an event inside it.  The transport also exchanges its own
//! handshake chatter (engine.io `0{...}`, `3`, and so on) on the same socket,
//! so any text that does not contain the data prefix is reported as
//! [`Decoded::NotAFrame`] instead of an error.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The join frame sent once on every freshly opened transport.
pub const JOIN_FRAME: &str = "40/chainx";

/// Marker that identifies a data frame anywhere in an inbound message.
pub const DATA_MARKER: &str = "42/chainx";

/// Prefix written in front of every outbound data frame.
pub const DATA_PREFIX: &str = "42/chainx,";

/// Errors that can occur while decoding or encoding a frame.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The text after the data marker is not valid JSON.
    #[error("malformed frame JSON: {0}")]
    MalformedJson(String),

    /// The JSON body is valid but is not a `[type, payload]` array.
    #[error("frame body is not a JSON array")]
    NotAnArray,

    /// The array is empty or its first element is not a string.
    #[error("frame body has no string type tag")]
    MissingType,

    /// A payload could not be serialized to JSON.
    #[error("failed to serialize frame payload: {0}")]
    Serialize(String),
}

/// The type tag carried in the first element of a data frame.
///
/// Unknown tags are preserved in [`FrameType::Other`] so the dispatcher can
/// log exactly what it dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameType {
    Connect,
    Pair,
    Paired,
    Rekey,
    Rekeyed,
    Api,
    Event,
    Ping,
    Pong,
    Connected,
    Other(String),
}

impl FrameType {
    /// Returns the wire spelling of this type tag.
    pub fn as_str(&self) -> &str {
        match self {
            FrameType::Connect => "connect",
            FrameType::Pair => "pair",
            FrameType::Paired => "paired",
            FrameType::Rekey => "rekey",
            FrameType::Rekeyed => "rekeyed",
            FrameType::Api => "api",
            FrameType::Event => "event",
            FrameType::Ping => "ping",
            FrameType::Pong => "pong",
            FrameType::Connected => "connected",
            FrameType::Other(name) => name,
        }
    }
}

impl From<&str> for FrameType {
    fn from(tag: &str) -> Self {
        match tag {
            "connect" => FrameType::Connect,
            "pair" => FrameType::Pair,
            "paired" => FrameType::Paired,
            "rekey" => FrameType::Rekey,
            "rekeyed" => FrameType::Rekeyed,
            "api" => FrameType::Api,
            "event" => FrameType::Event,
            "ping" => FrameType::Ping,
            "pong" => FrameType::Pong,
            "connected" => FrameType::Connected,
            other => FrameType::Other(other.to_string()),
        }
    }
}

/// One decoded data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameType,
    /// The second array element, or `Value::Null` when the frame has none.
    pub payload: Value,
}

/// Result of inspecting one inbound transport message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The message is transport chatter, not a protocol frame.
    NotAFrame,
    /// A protocol frame.
    Frame(Frame),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one inbound transport message.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the message carries the data marker but the
/// body is not a `[type, payload]` JSON array.
///
/// # Examples
///
/// ```rust
/// use chainx_signer_core::protocol::frame::{decode_frame, Decoded, FrameType};
///
/// let decoded = decode_frame(r#"42/chainx,["paired",true]"#).unwrap();
/// match decoded {
///     Decoded::Frame(frame) => {
///         assert_eq!(frame.kind, FrameType::Paired);
///         assert_eq!(frame.payload, serde_json::Value::Bool(true));
///     }
///     Decoded::NotAFrame => unreachable!(),
/// }
///
/// assert_eq!(decode_frame("3").unwrap(), Decoded::NotAFrame);
/// ```
pub fn decode_frame(text: &str) -> Result<Decoded, ProtocolError> {
    let Some(start) = text.find(DATA_MARKER) else {
        return Ok(Decoded::NotAFrame);
    };

    let body = &text[start + DATA_MARKER.len()..];
    let body = body.strip_prefix(',').unwrap_or(body);

    let value: Value =
        serde_json::from_str(body).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;

    let Value::Array(mut items) = value else {
        return Err(ProtocolError::NotAnArray);
    };
    if items.is_empty() {
        return Err(ProtocolError::MissingType);
    }

    // Take the payload first so the type tag stays at index 0.
    let payload = if items.len() > 1 {
        items.swap_remove(1)
    } else {
        Value::Null
    };
    let kind = match items.first() {
        Some(Value::String(tag)) => FrameType::from(tag.as_str()),
        _ => return Err(ProtocolError::MissingType),
    };

    Ok(Decoded::Frame(Frame { kind, payload }))
}

/// Encodes a data frame carrying `payload`.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if `payload` cannot be represented as JSON.
///
/// # Examples
///
/// ```rust
/// use chainx_signer_core::protocol::frame::{encode_frame, FrameType};
///
/// let text = encode_frame(&FrameType::Paired, &true).unwrap();
/// assert_eq!(text, r#"42/chainx,["paired",true]"#);
/// ```
pub fn encode_frame<T: Serialize + ?Sized>(
    kind: &FrameType,
    payload: &T,
) -> Result<String, ProtocolError> {
    let body = serde_json::to_string(&(kind.as_str(), payload))
        .map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    Ok(format!("{DATA_PREFIX}{body}"))
}

/// Encodes a data frame with no payload, e.g. `42/chainx,["pong"]`.
pub fn encode_bare_frame(kind: &FrameType) -> String {
    format!("{DATA_PREFIX}{}", Value::Array(vec![Value::String(kind.as_str().to_string())]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

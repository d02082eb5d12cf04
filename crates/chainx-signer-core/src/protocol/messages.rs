//! Typed payloads carried inside signer protocol frames.
//!
//! Outbound frames (`pair`, `api`, `rekeyed`) always wrap their body in an
//! [`Envelope`] that names the client plugin:
//!
//! ```json
//! ["pair", {"data": {"appkey": "appkey:…", "origin": "example.com", "passthrough": true},
//!           "plugin": "my-wallet"}]
//! ```
//!
//! Inbound payloads are looser: the signer may omit fields or send the `api`
//! response as a JSON string, so the client reads those through
//! `serde_json::Value` and only the well-known shapes get a struct here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The terminal transaction status reported by the signer.
pub const FINALIZED_STATUS: &str = "Finalized";

// ── Outbound payloads ─────────────────────────────────────────────────────────

/// Wrapper around every outbound frame body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    /// Name of the client application, shown by the signer in its UI.
    pub plugin: String,
}

/// Body of a `pair` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRequest {
    pub appkey: String,
    pub origin: String,
    /// `true` for the automatic attempt made right after connecting.
    pub passthrough: bool,
}

/// The call itself: method name, arguments, and the correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPayload {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Body of an `api` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub appkey: String,
    pub payload: ApiPayload,
    pub origin: String,
}

/// Body of a `rekeyed` frame, sent in answer to a signer-initiated `rekey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rekeyed {
    pub appkey: String,
    pub origin: String,
}

// ── Inbound payloads ──────────────────────────────────────────────────────────

/// Body of an `event` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Payload of a `TX_STATUS` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxStatusEvent {
    /// Correlation id of the sign call this status belongs to.
    pub id: String,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
}

impl TxStatusEvent {
    /// Returns the error value if one is present and not `null`.
    pub fn error(&self) -> Option<&Value> {
        self.err.as_ref().filter(|e| !e.is_null() && *e != &Value::Bool(false))
    }

    /// `true` once no further updates are expected for this transaction.
    pub fn is_terminal(&self) -> bool {
        if self.error().is_some() {
            return true;
        }
        self.status
            .as_ref()
            .and_then(|s| s.get("status"))
            .and_then(Value::as_str)
            == Some(FINALIZED_STATUS)
    }
}

// ── Method and event names ────────────────────────────────────────────────────

/// Methods the signer understands inside `api` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    Account,
    GetNode,
    GetSettings,
    Sign,
    SignSend,
    Chainx2Sign,
    Chainx2SignSend,
}

impl ApiMethod {
    /// Returns the wire spelling of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMethod::Account => "chainx_account",
            ApiMethod::GetNode => "chainx_get_node",
            ApiMethod::GetSettings => "get_settings",
            ApiMethod::Sign => "chainx_sign",
            ApiMethod::SignSend => "chainx_sign_send",
            ApiMethod::Chainx2Sign => "chainx2_sign",
            ApiMethod::Chainx2SignSend => "chainx2_sign_send",
        }
    }

    /// Parses a wire method name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "chainx_account" => Some(ApiMethod::Account),
            "chainx_get_node" => Some(ApiMethod::GetNode),
            "get_settings" => Some(ApiMethod::GetSettings),
            "chainx_sign" => Some(ApiMethod::Sign),
            "chainx_sign_send" => Some(ApiMethod::SignSend),
            "chainx2_sign" => Some(ApiMethod::Chainx2Sign),
            "chainx2_sign_send" => Some(ApiMethod::Chainx2SignSend),
            _ => None,
        }
    }

    /// `true` for the methods that produce `TX_STATUS` events.
    pub fn is_sign(self) -> bool {
        matches!(
            self,
            ApiMethod::Sign | ApiMethod::SignSend | ApiMethod::Chainx2Sign | ApiMethod::Chainx2SignSend
        )
    }
}

/// Returns `true` if `method` is one of the sign methods.
pub fn is_sign_method(method: &str) -> bool {
    ApiMethod::parse(method).is_some_and(ApiMethod::is_sign)
}

/// Push events the signer emits outside any request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerEvent {
    AccountChange,
    NodeChange,
    NetworkChange,
    TxStatus,
}

impl SignerEvent {
    /// Returns the event name as it appears in `event` frames.
    pub fn as_str(self) -> &'static str {
        match self {
            SignerEvent::AccountChange => "ACCOUNT_CHANGE",
            SignerEvent::NodeChange => "NODE_CHANGE",
            SignerEvent::NetworkChange => "NETWORK_CHANGE",
            SignerEvent::TxStatus => "TX_STATUS",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

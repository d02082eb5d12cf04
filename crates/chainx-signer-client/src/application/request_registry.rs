//! Correlated API calls.
//!
//! # How a call finds its answer (for beginners)
//!
//! The socket is a single ordered pipe, but the signer may answer calls in
//! any order (a signature waits for the user; `chainx_account` does not).
//! Every outgoing `api` frame therefore carries a random correlation id, and
//! the client keeps a table from id to "who is waiting for this".  When an
//! `api` response comes back, its `id` picks the entry, the entry is removed
//! and the caller is woken with the result.
//!
//! ```text
//!   send_api_request ─▶ register(id) ─▶ api frame ─────────▶ signer
//!          ▲                                                   │
//!          └──── oneshot ◀── settle(id) ◀── api response ◀─────┘
//! ```
//!
//! Each entry is settled at most once: the entry is removed before its
//! caller is notified, so a duplicate response finds nothing.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use chainx_signer_core::domain::{EventHandler, SubscriptionId};
use chainx_signer_core::protocol::correlation::{correlation_id, ID_ENTROPY_BYTES};
use chainx_signer_core::protocol::frame::FrameType;
use chainx_signer_core::protocol::messages::{is_sign_method, ApiMethod, ApiPayload, ApiRequest, SignerEvent, TxStatusEvent};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::ports::ClientError;
use super::state::{ClientCore, SessionState};

/// Receives `(err, status)` for every status update of a submitted transaction.
pub type TxStatusCallback = Arc<dyn Fn(Option<Value>, Option<Value>) + Send + Sync>;

type Responder = oneshot::Sender<Result<Value, ClientError>>;

/// A remote call: method name plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: String,
    pub params: Vec<Value>,
}

impl ApiCall {
    pub fn new(method: ApiMethod, params: Vec<Value>) -> Self {
        Self {
            method: method.as_str().to_string(),
            params,
        }
    }

    /// A call to a method this crate has no constant for.
    pub fn custom(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// One call awaiting its response.
#[derive(Debug)]
pub struct PendingRequest {
    pub payload: ApiPayload,
    /// `TX_STATUS` subscription following this call's transaction.
    pub watcher: Option<SubscriptionId>,
    responder: Responder,
}

/// What [`RequestRegistry::settle`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// No pending call carries the response's id.
    Unmatched,
    Resolved,
    /// The call was rejected.  Its status watcher, if any, will never see a
    /// status and should be dropped.
    Rejected { watcher: Option<SubscriptionId> },
}

impl Settled {
    pub fn is_matched(self) -> bool {
        !matches!(self, Settled::Unmatched)
    }
}

/// Calls failed together by [`RequestRegistry::fail_all`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FailedCalls {
    pub count: usize,
    /// Status watchers of the failed calls and of followed transactions.
    pub watchers: Vec<SubscriptionId>,
}

/// Result of interpreting an `api` frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDecode {
    Parsed(Value),
    DecodeFailed(String),
}

impl ResponseDecode {
    /// Some signers send the response object JSON-encoded inside a string.
    pub fn from_payload(payload: Value) -> Self {
        match payload {
            Value::String(text) => match serde_json::from_str(&text) {
                Ok(value) => ResponseDecode::Parsed(value),
                Err(e) => ResponseDecode::DecodeFailed(e.to_string()),
            },
            other => ResponseDecode::Parsed(other),
        }
    }
}

/// Correlation id → pending call.
///
/// Also remembers the status watchers of resolved sign calls whose
/// transactions are still being followed, so transport loss can drop them.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    pending: HashMap<String, PendingRequest>,
    following: Vec<SubscriptionId>,
}

impl RequestRegistry {
    /// Tracks `payload` and returns the receiver its response will arrive on.
    pub fn register(&mut self, payload: ApiPayload) -> oneshot::Receiver<Result<Value, ClientError>> {
        self.register_watched(payload, None)
    }

    /// Like [`register`](Self::register), remembering the call's status watcher.
    pub fn register_watched(
        &mut self,
        payload: ApiPayload,
        watcher: Option<SubscriptionId>,
    ) -> oneshot::Receiver<Result<Value, ClientError>> {
        let (responder, receiver) = oneshot::channel();
        let id = payload.id.clone();
        let pending = PendingRequest {
            payload,
            watcher,
            responder,
        };
        if self.pending.insert(id.clone(), pending).is_some() {
            warn!("correlation id {id} reused; the earlier call will never complete");
        }
        receiver
    }

    pub fn remove(&mut self, id: &str) -> Option<PendingRequest> {
        self.pending.remove(id)
    }

    /// Settles the request `response` answers.
    ///
    /// A non-null `error` rejects with [`ClientError::Remote`]; otherwise the
    /// call resolves with `result` (`null` when absent).  A response with no
    /// id, or one that matches nothing pending, is [`Settled::Unmatched`].
    pub fn settle(&mut self, response: &Value) -> Settled {
        let Some(id) = response.get("id").and_then(Value::as_str) else {
            return Settled::Unmatched;
        };
        let Some(pending) = self.pending.remove(id) else {
            return Settled::Unmatched;
        };

        let (outcome, settled) = match response.get("error") {
            Some(error) if !error.is_null() => (
                Err(ClientError::Remote(error.clone())),
                Settled::Rejected {
                    watcher: pending.watcher,
                },
            ),
            _ => {
                self.following.extend(pending.watcher);
                (
                    Ok(response.get("result").cloned().unwrap_or(Value::Null)),
                    Settled::Resolved,
                )
            }
        };
        if pending.responder.send(outcome).is_err() {
            debug!("caller of {} went away before its response arrived", pending.payload.method);
        }
        settled
    }

    /// Fails every pending request with `error` and empties the registry,
    /// including the watchers of transactions still being followed.
    pub fn fail_all(&mut self, error: &ClientError) -> FailedCalls {
        let mut failed = FailedCalls {
            count: 0,
            watchers: std::mem::take(&mut self.following),
        };
        for (_, pending) in self.pending.drain() {
            failed.count += 1;
            failed.watchers.extend(pending.watcher);
            let _ = pending.responder.send(Err(error.clone()));
        }
        failed
    }

    /// Forgets a followed watcher that removed itself on a final status.
    pub fn stop_following(&mut self, watcher: SubscriptionId) {
        self.following.retain(|sub| *sub != watcher);
    }

    /// Number of resolved sign calls whose status is still being followed.
    pub fn following_count(&self) -> usize {
        self.following.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl SessionState {
    /// Registers and sends one `api` frame.
    ///
    /// On a send failure nothing is left behind: the pending entry and any
    /// status watcher are removed before the error is returned.
    pub(crate) fn submit_api(
        &mut self,
        payload: ApiPayload,
        watcher: Option<(TxStatusCallback, Weak<ClientCore>)>,
    ) -> Result<oneshot::Receiver<Result<Value, ClientError>>, ClientError> {
        let id = payload.id.clone();
        let request = ApiRequest {
            appkey: self.keys.current().as_str().to_string(),
            payload: payload.clone(),
            origin: self.origin(),
        };

        let subscription = match watcher {
            Some((callback, core)) if is_sign_method(&payload.method) => Some(self.watch_tx_status(&id, callback, core)),
            _ => None,
        };
        let receiver = self.requests.register_watched(payload, subscription);

        if let Err(e) = self.send_frame(FrameType::Api, request) {
            self.requests.remove(&id);
            if let Some(sub) = subscription {
                self.events.remove(SignerEvent::TxStatus.as_str(), sub);
            }
            return Err(ClientError::Network(format!("can not send api request: {e}")));
        }
        Ok(receiver)
    }

    /// Subscribes a `TX_STATUS` handler for transaction `id` that removes
    /// itself once the status is final.
    fn watch_tx_status(&mut self, id: &str, callback: TxStatusCallback, core: Weak<ClientCore>) -> SubscriptionId {
        let slot: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());
        let handler = tx_status_watcher(id.to_string(), callback, core, Arc::clone(&slot));
        let sub = self.events.add(SignerEvent::TxStatus.as_str(), handler);
        let _ = slot.set(sub);
        sub
    }

    /// Unsubscribes status watchers whose calls ended without a transaction.
    pub(crate) fn drop_watchers(&mut self, watchers: &[SubscriptionId]) {
        for sub in watchers {
            if self.events.remove(SignerEvent::TxStatus.as_str(), *sub) {
                debug!("status watcher {sub:?} dropped with its failed call");
            }
        }
    }

    /// Fails every pending call with a network error and drops their watchers.
    pub(crate) fn fail_pending(&mut self, reason: &str) -> usize {
        let failed = self.requests.fail_all(&ClientError::Network(reason.to_string()));
        self.drop_watchers(&failed.watchers);
        failed.count
    }
}

fn tx_status_watcher(
    id: String,
    callback: TxStatusCallback,
    core: Weak<ClientCore>,
    slot: Arc<OnceLock<SubscriptionId>>,
) -> EventHandler {
    Arc::new(move |payload: &Value| {
        let event: TxStatusEvent = match serde_json::from_value(payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                debug!("ignoring malformed TX_STATUS payload: {e}");
                return;
            }
        };
        if event.id != id {
            return;
        }

        callback(event.error().cloned(), event.status.clone());

        if event.is_terminal() {
            if let (Some(core), Some(sub)) = (core.upgrade(), slot.get()) {
                let mut state = core.lock();
                state.events.remove(SignerEvent::TxStatus.as_str(), *sub);
                state.requests.stop_following(*sub);
                debug!("transaction {id} finished; status watcher removed");
            }
        }
    })
}

impl ClientCore {
    /// Sends one call and resolves with the signer's result.
    ///
    /// Pairs first (non-passthrough) if the session is not paired.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotPaired`] if pairing is declined; no `api` frame is sent.
    /// - [`ClientError::Network`] if the frame cannot be sent or the
    ///   connection is lost before the answer arrives.
    /// - [`ClientError::Remote`] if the signer answers with an error.
    pub(crate) async fn send_api_request(
        self: &Arc<Self>,
        call: ApiCall,
        callback: Option<TxStatusCallback>,
    ) -> Result<Value, ClientError> {
        let payload = ApiPayload {
            id: correlation_id(&self.entropy.random_bytes(ID_ENTROPY_BYTES)),
            method: call.method,
            params: call.params,
        };

        let paired = self.lock().session.paired;
        if !paired && !self.pair(false).await? {
            return Err(ClientError::NotPaired);
        }

        let receiver = {
            let watcher = callback.map(|cb| (cb, Arc::downgrade(self)));
            let mut state = self.lock();
            state.submit_api(payload, watcher)?
        };

        receiver
            .await
            .unwrap_or_else(|_| Err(ClientError::Network("request dropped before a response arrived".to_string())))
    }
}

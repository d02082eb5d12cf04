//! [`SignerClient`]: the public face of a signer session.
//!
//! One `SignerClient` owns one session.  It is cheap to clone; clones share
//! the same connection, pairing state and event subscriptions.
//!
//! ```no_run
//! # async fn demo(client: chainx_signer_client::SignerClient) -> Result<(), chainx_signer_client::ClientError> {
//! client.link().await?;
//! let account = client.get_current_account().await?;
//! println!("current account: {account}");
//! # Ok(()) }
//! ```

use std::sync::Arc;

use chainx_signer_core::domain::{AppKey, EventHandler, PairingState, SubscriptionId};
use chainx_signer_core::protocol::messages::{ApiMethod, SignerEvent};
use serde_json::{json, Value};

use super::connection::{LinkOutcome, LinkTrigger};
use super::ports::{ClientError, ClientPorts};
use super::request_registry::{ApiCall, TxStatusCallback};
use super::state::ClientCore;
use crate::domain::config::ClientConfig;

/// A session with a locally running signer.
#[derive(Clone)]
pub struct SignerClient {
    core: Arc<ClientCore>,
}

impl SignerClient {
    /// Creates an unconnected client.  The stored appkey, if any, is loaded
    /// now; nothing touches the network until [`link`](Self::link).
    pub fn new(config: &ClientConfig, ports: ClientPorts) -> Self {
        Self {
            core: Arc::new(ClientCore::new(config, ports)),
        }
    }

    // ── Connection ────────────────────────────────────────────────────────────

    /// Finds and connects to a signer, then attempts passthrough pairing.
    ///
    /// # Errors
    ///
    /// [`ClientError::SignerNotFound`] if no signer is listening, or
    /// [`ClientError::Network`] if the fresh channel fails immediately.
    pub async fn link(&self) -> Result<LinkOutcome, ClientError> {
        self.core.link(LinkTrigger::Caller).await
    }

    /// Closes the connection and stops auto-reconnect.  Always returns `true`.
    pub fn disconnect(&self) -> bool {
        self.core.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.core.lock().session.connected
    }

    pub fn is_paired(&self) -> bool {
        self.core.lock().session.paired
    }

    /// Unpaired, paired, or waiting on a pairing answer from the signer.
    pub fn pairing_state(&self) -> PairingState {
        let state = self.core.lock();
        state.session.pairing_state(state.pairing.is_negotiating())
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.core.lock().session.auto_reconnect = enabled;
    }

    /// The key currently presented to the signer.
    pub fn appkey(&self) -> AppKey {
        self.core.lock().keys.current().clone()
    }

    /// The origin presented to the signer: the hostname, or the plugin name
    /// when there is no usable hostname.
    pub fn origin(&self) -> String {
        self.core.lock().origin()
    }

    /// Requests pairing.  Joins a negotiation already in flight.
    ///
    /// # Errors
    ///
    /// [`ClientError::Network`] if the `pair` frame could not be sent.
    pub async fn pair(&self, passthrough: bool) -> Result<bool, ClientError> {
        self.core.pair(passthrough).await
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    /// Sends an arbitrary call and waits for its result.
    ///
    /// For sign methods, `callback` receives `(err, status)` for each
    /// `TX_STATUS` update of the submitted transaction until it is final.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotPaired`], [`ClientError::Network`] or
    /// [`ClientError::Remote`].
    pub async fn send_api_request(
        &self,
        call: ApiCall,
        callback: Option<TxStatusCallback>,
    ) -> Result<Value, ClientError> {
        self.core.send_api_request(call, callback).await
    }

    pub async fn get_current_account(&self) -> Result<Value, ClientError> {
        self.call(ApiMethod::Account, vec![], None).await
    }

    pub async fn get_current_node(&self) -> Result<Value, ClientError> {
        self.call(ApiMethod::GetNode, vec![], None).await
    }

    pub async fn get_settings(&self) -> Result<Value, ClientError> {
        self.call(ApiMethod::GetSettings, vec![], None).await
    }

    /// Asks the signer to sign `hex` with `address` and return the signature.
    pub async fn sign_extrinsic(&self, address: &str, hex: &str) -> Result<Value, ClientError> {
        self.call(ApiMethod::Sign, vec![json!(address), json!(hex)], None).await
    }

    /// Asks the signer to sign and submit `hex`.  `callback` follows the
    /// transaction until it is finalized or fails.
    pub async fn sign_and_send_extrinsic(
        &self,
        address: &str,
        hex: &str,
        callback: Option<TxStatusCallback>,
    ) -> Result<Value, ClientError> {
        self.call(ApiMethod::SignSend, vec![json!(address), json!(hex)], callback)
            .await
    }

    pub async fn sign_chainx2_extrinsic(&self, address: &str, data: Value) -> Result<Value, ClientError> {
        self.call(ApiMethod::Chainx2Sign, vec![json!(address), data], None).await
    }

    pub async fn sign_and_send_chainx2_extrinsic(
        &self,
        address: &str,
        data: Value,
        callback: Option<TxStatusCallback>,
    ) -> Result<Value, ClientError> {
        self.call(ApiMethod::Chainx2SignSend, vec![json!(address), data], callback)
            .await
    }

    async fn call(
        &self,
        method: ApiMethod,
        params: Vec<Value>,
        callback: Option<TxStatusCallback>,
    ) -> Result<Value, ClientError> {
        self.core
            .send_api_request(ApiCall::new(method, params), callback)
            .await
    }

    // ── Events ────────────────────────────────────────────────────────────────

    /// Subscribes `handler` to `event`; handlers run in subscription order.
    pub fn add_event_handler(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        self.core.lock().events.add(event, handler)
    }

    /// Removes every handler of `event`.  Returns how many were removed.
    pub fn remove_event_handler(&self, event: &str) -> usize {
        self.core.lock().events.clear(event)
    }

    /// Removes the one handler registered as `id`.
    pub fn remove_event_listener(&self, event: &str, id: SubscriptionId) -> bool {
        self.core.lock().events.remove(event, id)
    }

    pub fn listen_account_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listen(SignerEvent::AccountChange, listener)
    }

    pub fn remove_account_change_listener(&self, id: SubscriptionId) -> bool {
        self.remove_event_listener(SignerEvent::AccountChange.as_str(), id)
    }

    pub fn listen_node_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listen(SignerEvent::NodeChange, listener)
    }

    pub fn remove_node_change_listener(&self, id: SubscriptionId) -> bool {
        self.remove_event_listener(SignerEvent::NodeChange.as_str(), id)
    }

    pub fn listen_network_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listen(SignerEvent::NetworkChange, listener)
    }

    pub fn remove_network_change_listener(&self, id: SubscriptionId) -> bool {
        self.remove_event_listener(SignerEvent::NetworkChange.as_str(), id)
    }

    fn listen<F>(&self, event: SignerEvent, listener: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.add_event_handler(event.as_str(), Arc::new(listener))
    }

    /// Number of handlers currently subscribed to `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.core.lock().events.handler_count(event)
    }
}

//! Per-client session state and the inbound frame dispatcher.
//!
//! Everything the protocol mutates lives in one [`SessionState`], guarded by
//! a single `std::sync::Mutex` inside [`ClientCore`].  The lock is held only
//! for short synchronous sections: it is never held across an `.await`, and
//! event handlers run after it is released (they are free to subscribe,
//! unsubscribe or issue calls of their own).
//!
//! # Frame routing
//!
//! | Frame       | Action                                                  |
//! |-------------|---------------------------------------------------------|
//! | `paired`    | settle pairing waiters, promote the key on success      |
//! | `rekey`     | rotate the key, drop trust, answer with `rekeyed`       |
//! | `api`       | settle the matching pending request                     |
//! | `event`     | fan out to the event's handlers                         |
//! | `ping`      | answer with a bare `pong`                               |
//! | `pong`      | ignored                                                 |
//! | `connected` | logged                                                  |
//! | anything else | logged and dropped                                    |

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chainx_signer_core::domain::{dispatch, resolve_origin, EventHandler, EventRouter, Session};
use chainx_signer_core::protocol::frame::{decode_frame, encode_bare_frame, encode_frame, Decoded, FrameType, JOIN_FRAME};
use chainx_signer_core::protocol::messages::{Envelope, EventMessage, Rekeyed};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::connection::LinkTrigger;
use super::key_lifecycle::KeyLifecycle;
use super::pairing::PairingSession;
use super::ports::{ClientError, ClientPorts, EntropySource, FrameSink, OriginProvider, SocketTransport, TransportLocator};
use super::request_registry::{RequestRegistry, ResponseDecode, Settled};
use crate::domain::config::ClientConfig;

/// Handlers to run once the session lock has been released.
pub(crate) struct DeferredDispatch {
    event: String,
    handlers: Vec<EventHandler>,
    payload: Value,
}

impl DeferredDispatch {
    pub(crate) fn run(self) {
        dispatch(&self.event, &self.handlers, &self.payload);
    }
}

/// The mutable protocol state of one client.
pub(crate) struct SessionState {
    pub(crate) session: Session,
    pub(crate) keys: KeyLifecycle,
    pub(crate) pairing: PairingSession,
    pub(crate) requests: RequestRegistry,
    pub(crate) events: EventRouter,
    sink: Option<Arc<dyn FrameSink>>,
    /// Bumped on every new transport; closes from older ones are ignored.
    generation: u64,
    plugin: String,
    origin: Arc<dyn OriginProvider>,
}

impl SessionState {
    pub(crate) fn new(config: &ClientConfig, ports: &ClientPorts) -> Self {
        Self {
            session: Session::new(config.auto_reconnect),
            keys: KeyLifecycle::load(
                Arc::clone(&ports.key_store),
                Arc::clone(&ports.digest),
                Arc::clone(&ports.entropy),
            ),
            pairing: PairingSession::default(),
            requests: RequestRegistry::default(),
            events: EventRouter::new(),
            sink: None,
            generation: 0,
            plugin: config.plugin.clone(),
            origin: Arc::clone(&ports.origin),
        }
    }

    pub(crate) fn origin(&self) -> String {
        resolve_origin(self.origin.hostname().as_deref(), &self.plugin)
    }

    /// Wraps `data` in the plugin envelope and sends it as a `kind` frame.
    pub(crate) fn send_frame<T: Serialize>(&self, kind: FrameType, data: T) -> Result<(), ClientError> {
        let envelope = Envelope {
            data,
            plugin: self.plugin.clone(),
        };
        let text = encode_frame(&kind, &envelope).map_err(|e| ClientError::Network(e.to_string()))?;
        debug!("sending {} frame", kind.as_str());
        self.send_text(text)
    }

    fn send_text(&self, text: String) -> Result<(), ClientError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| ClientError::Network("not connected to a signer".to_string()))?;
        sink.send(text).map_err(|e| ClientError::Network(e.to_string()))
    }

    /// Adopts a freshly opened transport and announces the namespace.
    ///
    /// The join frame goes out before anything is committed: if it cannot be
    /// sent, the new transport is closed and the session is left as it was.
    /// A reconnect that `disconnect()` overtook while the transport was
    /// opening is abandoned the same way and yields `Ok(None)`.
    ///
    /// Otherwise any previous transport is closed, and whatever was waiting
    /// on it is settled: pending calls fail, pairing waiters receive `false`.
    /// Returns the new connection generation.
    pub(crate) fn attach(&mut self, sink: Arc<dyn FrameSink>, trigger: LinkTrigger) -> Result<Option<u64>, ClientError> {
        if trigger == LinkTrigger::Reconnect && !self.session.should_reconnect() {
            sink.close();
            debug!("reconnect abandoned; the session was disconnected meanwhile");
            return Ok(None);
        }
        if let Err(e) = sink.send(JOIN_FRAME.to_string()) {
            sink.close();
            return Err(ClientError::Network(format!("can not join the signer namespace: {e}")));
        }

        if let Some(previous) = self.sink.replace(sink) {
            previous.close();
            self.fail_pending("connection replaced by a new link");
        }
        self.generation += 1;
        if trigger == LinkTrigger::Caller {
            self.session.manual_disconnect = false;
        }
        self.session.mark_connected();
        self.pairing.settle(false);
        Ok(Some(self.generation))
    }

    /// Closes the transport at the caller's request.  Safe to repeat.
    pub(crate) fn detach(&mut self) {
        self.session.manual_disconnect = true;
        if let Some(sink) = self.sink.take() {
            sink.close();
            info!("disconnected from signer");
        }
        self.session.connected = false;
    }

    /// Handles the end of transport `generation`.
    ///
    /// Returns `true` when the client should try to reconnect.
    pub(crate) fn handle_transport_closed(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            debug!("ignoring close of superseded connection {generation}");
            return false;
        }
        self.sink = None;
        self.session.mark_transport_lost();
        let failed = self.fail_pending("connection to signer lost");
        self.pairing.settle(false);
        info!("connection to signer closed ({failed} pending calls failed)");
        self.session.should_reconnect()
    }

    /// Decodes one inbound message and applies it.
    ///
    /// Event handlers are not run here; they come back as a
    /// [`DeferredDispatch`] for the caller to run after unlocking.
    pub(crate) fn handle_message(&mut self, text: &str) -> Option<DeferredDispatch> {
        let frame = match decode_frame(text) {
            Ok(Decoded::Frame(frame)) => frame,
            Ok(Decoded::NotAFrame) => {
                debug!("ignoring transport chatter");
                return None;
            }
            Err(e) => {
                warn!("dropping undecodable frame: {e}");
                return None;
            }
        };

        match frame.kind {
            FrameType::Pong => {}
            FrameType::Ping => {
                if let Err(e) = self.send_text(encode_bare_frame(&FrameType::Pong)) {
                    warn!("could not answer ping: {e}");
                }
            }
            FrameType::Connected => info!("signer confirmed the connection"),
            FrameType::Paired => match frame.payload.as_bool() {
                Some(accepted) => self.handle_paired(accepted),
                None => {
                    warn!("paired frame without a boolean payload; treating as declined");
                    self.handle_paired(false);
                }
            },
            FrameType::Rekey => self.handle_rekey(),
            FrameType::Api => self.handle_api_response(frame.payload),
            FrameType::Event => return self.handle_event(frame.payload),
            other => warn!("dropping unexpected {} frame", other.as_str()),
        }
        None
    }

    fn handle_rekey(&mut self) {
        self.keys.rotate();
        self.session.paired = false;
        let rekeyed = Rekeyed {
            appkey: self.keys.current().as_str().to_string(),
            origin: self.origin(),
        };
        if let Err(e) = self.send_frame(FrameType::Rekeyed, rekeyed) {
            warn!("could not acknowledge rekey: {e}");
        }
    }

    fn handle_api_response(&mut self, payload: Value) {
        match ResponseDecode::from_payload(payload) {
            ResponseDecode::Parsed(response) => {
                match self.requests.settle(&response) {
                    Settled::Unmatched => debug!("ignoring api response that matches no pending call"),
                    Settled::Rejected { watcher } => self.drop_watchers(watcher.as_slice()),
                    Settled::Resolved => {}
                }
            }
            ResponseDecode::DecodeFailed(e) => warn!("dropping api response that is not valid JSON: {e}"),
        }
    }

    fn handle_event(&self, payload: Value) -> Option<DeferredDispatch> {
        let message: EventMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping malformed event frame: {e}");
                return None;
            }
        };
        let handlers = self.events.handlers(&message.event);
        if handlers.is_empty() {
            debug!("no handlers for event {}", message.event);
            return None;
        }
        Some(DeferredDispatch {
            event: message.event,
            handlers,
            payload: message.payload,
        })
    }
}

/// State shared between a client handle, its reader task and reconnects.
pub(crate) struct ClientCore {
    state: Mutex<SessionState>,
    pub(crate) locator: Arc<dyn TransportLocator>,
    pub(crate) transport: Arc<dyn SocketTransport>,
    pub(crate) entropy: Arc<dyn EntropySource>,
    pub(crate) reconnect_delay: Duration,
    pub(crate) max_reconnect_attempts: Option<u32>,
}

impl ClientCore {
    pub(crate) fn new(config: &ClientConfig, ports: ClientPorts) -> Self {
        Self {
            state: Mutex::new(SessionState::new(config, &ports)),
            locator: ports.locator,
            transport: ports.transport,
            entropy: ports.entropy,
            reconnect_delay: config.reconnect_delay,
            max_reconnect_attempts: config.max_reconnect_attempts,
        }
    }

    /// Locks the session state.  A handler panic cannot poison it, since
    /// handlers never run under the lock; recover the guard regardless.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies one inbound message, then runs any event handlers unlocked.
    pub(crate) fn route_inbound(&self, text: &str) {
        let deferred = self.lock().handle_message(text);
        if let Some(deferred) = deferred {
            deferred.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::TransportError;
    use crate::infrastructure::crypto::{SeededEntropy, Sha256Digest, StaticOrigin};
    use crate::infrastructure::locator::StaticLocator;
    use crate::infrastructure::storage::MemoryKeyStore;
    use crate::infrastructure::transport::MockTransport;
    use chainx_signer_core::protocol::frame::Frame;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// A sink that records what is sent and can be told to fail.
    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<String>>,
        closed: StdMutex<bool>,
        broken: bool,
    }

    impl FrameSink for RecordingSink {
        fn send(&self, text: String) -> Result<(), TransportError> {
            if self.broken {
                return Err(TransportError::Closed);
            }
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    impl RecordingSink {
        fn frames(&self) -> Vec<Frame> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|t| match decode_frame(t) {
                    Ok(Decoded::Frame(f)) => Some(f),
                    _ => None,
                })
                .collect()
        }
    }

    fn state_with(hostname: Option<&str>) -> SessionState {
        let ports = ClientPorts {
            locator: Arc::new(StaticLocator::none()),
            transport: Arc::new(MockTransport::new()),
            key_store: Arc::new(MemoryKeyStore::new()),
            entropy: Arc::new(SeededEntropy::new(3)),
            digest: Arc::new(Sha256Digest),
            origin: Arc::new(StaticOrigin::new(hostname.map(str::to_string))),
        };
        let config = ClientConfig {
            plugin: "wallet".to_string(),
            ..ClientConfig::default()
        };
        SessionState::new(&config, &ports)
    }

    fn attach_new(state: &mut SessionState) -> u64 {
        state
            .attach(Arc::new(RecordingSink::default()), LinkTrigger::Caller)
            .unwrap()
            .unwrap()
    }

    fn attached(hostname: Option<&str>) -> (SessionState, Arc<RecordingSink>) {
        let mut state = state_with(hostname);
        let sink = Arc::new(RecordingSink::default());
        state.attach(sink.clone(), LinkTrigger::Caller).unwrap();
        (state, sink)
    }

    #[test]
    fn test_attach_sends_join_and_marks_connected() {
        // Arrange / Act
        let (state, sink) = attached(None);

        // Assert
        assert_eq!(sink.sent.lock().unwrap()[0], JOIN_FRAME);
        assert!(state.session.connected);
        assert!(!state.session.manual_disconnect);
    }

    #[test]
    fn test_ping_is_answered_with_bare_pong() {
        let (mut state, sink) = attached(None);
        state.handle_message(r#"42/chainx,["ping"]"#);
        assert_eq!(sink.sent.lock().unwrap().last().unwrap(), r#"42/chainx,["pong"]"#);
    }

    #[test]
    fn test_pong_and_chatter_send_nothing() {
        let (mut state, sink) = attached(None);
        state.handle_message(r#"42/chainx,["pong"]"#);
        state.handle_message("3");
        state.handle_message("42/chainx,not json");
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rekey_rotates_key_and_sends_rekeyed_with_origin() {
        // Arrange
        let (mut state, sink) = attached(Some("www.example.com"));
        state.session.paired = true;
        let before = state.keys.current().clone();

        // Act
        state.handle_message(r#"42/chainx,["rekey"]"#);

        // Assert
        let after = state.keys.current().clone();
        assert_ne!(before, after);
        assert!(after.is_ephemeral());
        assert!(!state.session.paired);
        let frame = sink.frames().pop().unwrap();
        assert_eq!(frame.kind, FrameType::Rekeyed);
        assert_eq!(frame.payload["data"]["appkey"], json!(after.as_str()));
        assert_eq!(frame.payload["data"]["origin"], json!("example.com"));
        assert_eq!(frame.payload["plugin"], json!("wallet"));
    }

    #[test]
    fn test_paired_true_promotes_key() {
        let (mut state, _sink) = attached(None);
        state.handle_message(r#"42/chainx,["paired",true]"#);
        assert!(state.session.paired);
        assert!(!state.keys.current().is_ephemeral());
    }

    #[test]
    fn test_paired_false_keeps_ephemeral_key() {
        let (mut state, _sink) = attached(None);
        state.handle_message(r#"42/chainx,["paired",false]"#);
        assert!(!state.session.paired);
        assert!(state.keys.current().is_ephemeral());
    }

    #[test]
    fn test_event_with_handlers_is_deferred() {
        // Arrange
        let (mut state, _sink) = attached(None);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        state.events.add(
            "NODE_CHANGE",
            Arc::new(move |payload: &Value| recorder.lock().unwrap().push(payload.clone())),
        );

        // Act
        let deferred = state.handle_message(r#"42/chainx,["event",{"event":"NODE_CHANGE","payload":{"url":"wss://x"}}]"#);

        // Assert: nothing ran while the state was borrowed.
        assert!(seen.lock().unwrap().is_empty());
        deferred.unwrap().run();
        assert_eq!(*seen.lock().unwrap(), vec![json!({"url": "wss://x"})]);
    }

    #[test]
    fn test_event_without_handlers_defers_nothing() {
        let (mut state, _sink) = attached(None);
        assert!(state
            .handle_message(r#"42/chainx,["event",{"event":"ACCOUNT_CHANGE","payload":{}}]"#)
            .is_none());
    }

    #[test]
    fn test_api_response_as_json_string_settles() {
        let (mut state, _sink) = attached(None);
        let mut rx = state.requests.register(chainx_signer_core::protocol::messages::ApiPayload {
            id: "77".to_string(),
            method: "chainx_account".to_string(),
            params: vec![],
        });
        state.handle_message(r#"42/chainx,["api","{\"id\":\"77\",\"result\":\"ok\"}"]"#);
        assert_eq!(rx.try_recv().unwrap(), Ok(json!("ok")));
    }

    #[test]
    fn test_close_of_current_generation_fails_pending_and_asks_for_reconnect() {
        // Arrange
        let mut state = state_with(None);
        let generation = attach_new(&mut state);
        state.session.paired = true;
        let mut rx = state.requests.register(chainx_signer_core::protocol::messages::ApiPayload {
            id: "1".to_string(),
            method: "get_settings".to_string(),
            params: vec![],
        });

        // Act
        let reconnect = state.handle_transport_closed(generation);

        // Assert
        assert!(reconnect);
        assert!(!state.session.connected);
        assert!(!state.session.paired);
        assert_eq!(rx.try_recv().unwrap().unwrap_err().code(), "network_error");
    }

    #[test]
    fn test_close_of_superseded_generation_is_ignored() {
        let mut state = state_with(None);
        let old = attach_new(&mut state);
        attach_new(&mut state);

        assert!(!state.handle_transport_closed(old));
        assert!(state.session.connected);
    }

    #[test]
    fn test_close_after_detach_does_not_reconnect() {
        let mut state = state_with(None);
        let generation = attach_new(&mut state);
        state.detach();
        assert!(!state.handle_transport_closed(generation));
    }

    #[test]
    fn test_failed_join_leaves_session_untouched() {
        // Arrange
        let mut state = state_with(None);
        let sink = Arc::new(RecordingSink {
            broken: true,
            ..RecordingSink::default()
        });

        // Act
        let result = state.attach(sink.clone(), LinkTrigger::Caller);

        // Assert
        assert_eq!(result.unwrap_err().code(), "network_error");
        assert!(*sink.closed.lock().unwrap());
        assert!(!state.session.connected);
        assert!(state.send_frame(FrameType::Pair, json!({})).is_err());
    }

    #[test]
    fn test_failed_join_keeps_previous_transport() {
        let (mut state, previous) = attached(None);
        let broken = Arc::new(RecordingSink {
            broken: true,
            ..RecordingSink::default()
        });

        assert!(state.attach(broken, LinkTrigger::Caller).is_err());

        assert!(state.session.connected);
        assert!(!*previous.closed.lock().unwrap());
        state.send_frame(FrameType::Pair, json!({})).unwrap();
        assert_eq!(previous.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_reconnect_attach_after_detach_is_abandoned() {
        // Arrange: the user disconnected while the reconnect was opening.
        let (mut state, _first) = attached(None);
        state.detach();
        let late = Arc::new(RecordingSink::default());

        // Act
        let generation = state.attach(late.clone(), LinkTrigger::Reconnect).unwrap();

        // Assert
        assert_eq!(generation, None);
        assert!(*late.closed.lock().unwrap());
        assert!(late.sent.lock().unwrap().is_empty());
        assert!(!state.session.connected);
        assert!(state.session.manual_disconnect);
    }

    #[test]
    fn test_caller_attach_after_detach_clears_manual_disconnect() {
        let mut state = state_with(None);
        attach_new(&mut state);
        state.detach();

        attach_new(&mut state);

        assert!(!state.session.manual_disconnect);
        assert!(state.session.should_reconnect());
    }

    #[test]
    fn test_rejected_sign_call_drops_its_watcher() {
        // Arrange
        let (mut state, _sink) = attached(None);
        let watcher = state.events.add("TX_STATUS", Arc::new(|_: &Value| {}));
        let _rx = state.requests.register_watched(
            chainx_signer_core::protocol::messages::ApiPayload {
                id: "9".to_string(),
                method: "chainx_sign_send".to_string(),
                params: vec![],
            },
            Some(watcher),
        );

        // Act
        state.handle_message(r#"42/chainx,["api",{"id":"9","error":{"message":"user rejected"}}]"#);

        // Assert
        assert_eq!(state.events.handler_count("TX_STATUS"), 0);
    }

    #[test]
    fn test_transport_loss_drops_followed_watchers() {
        // Arrange: a sign call resolved, its transaction is still followed.
        let mut state = state_with(None);
        let generation = attach_new(&mut state);
        let watcher = state.events.add("TX_STATUS", Arc::new(|_: &Value| {}));
        let _rx = state.requests.register_watched(
            chainx_signer_core::protocol::messages::ApiPayload {
                id: "9".to_string(),
                method: "chainx_sign_send".to_string(),
                params: vec![],
            },
            Some(watcher),
        );
        state.handle_message(r#"42/chainx,["api",{"id":"9","result":"0xhash"}]"#);
        assert_eq!(state.events.handler_count("TX_STATUS"), 1);

        // Act
        state.handle_transport_closed(generation);

        // Assert
        assert_eq!(state.events.handler_count("TX_STATUS"), 0);
    }

    #[test]
    fn test_detach_closes_sink_and_is_repeatable() {
        let (mut state, sink) = attached(None);
        state.detach();
        state.detach();
        assert!(*sink.closed.lock().unwrap());
        assert!(!state.session.connected);
        assert!(state.session.manual_disconnect);
    }

    #[test]
    fn test_send_without_transport_is_network_error() {
        let state = state_with(None);
        let err = state.send_frame(FrameType::Pair, json!({})).unwrap_err();
        assert_eq!(err.code(), "network_error");
    }

    #[test]
    fn test_origin_falls_back_to_plugin() {
        assert_eq!(state_with(None).origin(), "wallet");
        assert_eq!(state_with(Some("localhost")).origin(), "wallet");
        assert_eq!(state_with(Some("dapp.io")).origin(), "dapp.io");
    }
}

//! In-memory transport for tests.
//!
//! # Why a mock transport?
//!
//! A real signer is a separate desktop application that asks a human to
//! approve things.  Tests cannot rely on one running, and could not click
//! its buttons anyway.  `MockTransport` stands in for it:
//!
//! - every frame the client sends is recorded in order,
//! - the test injects inbound frames as if the signer had sent them,
//! - the test can drop the connection or refuse new ones.
//!
//! # Usage in tests
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.auto_pair(Some(true));
//! let client = SignerClient::new(&config, ports_with(transport.clone()));
//!
//! client.link().await?;
//! let call = tokio::spawn(async move { client.get_settings().await });
//! let api = transport.wait_for_frames(FrameType::Api, 1).await;
//! transport.push_frame(FrameType::Api, &json!({"id": api[0].payload["data"]["payload"]["id"], "result": {}}));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainx_signer_core::protocol::frame::{decode_frame, encode_frame, Decoded, Frame, FrameType};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::application::ports::{FrameSink, OpenChannel, SignerTarget, SocketTransport, TransportError, TransportEvent};

/// How long [`MockTransport::wait_for_frames`] polls before giving up.
const WAIT_LIMIT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A transport whose "signer" is the test itself.  Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<String>>,
    connections: Mutex<Vec<MockConnection>>,
    refuse: AtomicBool,
    fail_sends: AtomicBool,
    auto_pair: Mutex<Option<bool>>,
}

#[derive(Clone)]
struct MockConnection {
    events: mpsc::UnboundedSender<TransportEvent>,
    closed_by_client: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, `open` fails as if the signer refused the socket.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    /// When set, every send fails as if the socket had died.
    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Answers every `pair` frame with `paired(answer)`.  `None` leaves
    /// pairing to the test.
    pub fn auto_pair(&self, answer: Option<bool>) {
        *lock(&self.inner.auto_pair) = answer;
    }

    /// Number of channels opened so far.
    pub fn open_count(&self) -> usize {
        lock(&self.inner.connections).len()
    }

    /// Every raw text the client has sent, across all connections.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.inner.sent).clone()
    }

    /// Sent texts that decode as data frames.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent()
            .iter()
            .filter_map(|text| match decode_frame(text) {
                Ok(Decoded::Frame(frame)) => Some(frame),
                _ => None,
            })
            .collect()
    }

    /// Sent frames of one type, in order.
    pub fn frames_of(&self, kind: &FrameType) -> Vec<Frame> {
        self.sent_frames()
            .into_iter()
            .filter(|frame| &frame.kind == kind)
            .collect()
    }

    /// Waits until at least `count` frames of `kind` were sent, then returns
    /// all of them.  Returns what it has if that takes too long.
    pub async fn wait_for_frames(&self, kind: FrameType, count: usize) -> Vec<Frame> {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            let frames = self.frames_of(&kind);
            if frames.len() >= count || tokio::time::Instant::now() >= deadline {
                return frames;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Delivers `text` on the newest connection as if the signer sent it.
    pub fn push_inbound(&self, text: impl Into<String>) -> bool {
        match self.latest() {
            Some(conn) => conn.events.send(TransportEvent::Message(text.into())).is_ok(),
            None => false,
        }
    }

    /// Encodes and delivers a `kind` frame with `payload`.
    pub fn push_frame<T: Serialize + ?Sized>(&self, kind: FrameType, payload: &T) -> bool {
        match encode_frame(&kind, payload) {
            Ok(text) => self.push_inbound(text),
            Err(_) => false,
        }
    }

    /// Closes the newest connection from the signer's side.
    pub fn drop_connection(&self) -> bool {
        match self.latest() {
            Some(conn) => conn.events.send(TransportEvent::Closed).is_ok(),
            None => false,
        }
    }

    /// `true` if the client closed the newest connection itself.
    pub fn closed_by_client(&self) -> bool {
        self.latest()
            .is_some_and(|conn| conn.closed_by_client.load(Ordering::SeqCst))
    }

    fn latest(&self) -> Option<MockConnection> {
        lock(&self.inner.connections).last().cloned()
    }
}

#[async_trait]
impl SocketTransport for MockTransport {
    async fn open(&self, _target: &SignerTarget) -> Option<OpenChannel> {
        if self.inner.refuse.load(Ordering::SeqCst) {
            return None;
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let conn = MockConnection {
            events: events_tx,
            closed_by_client: Arc::new(AtomicBool::new(false)),
        };
        lock(&self.inner.connections).push(conn.clone());

        let sink = MockSink {
            state: Arc::clone(&self.inner),
            conn,
        };
        Some(OpenChannel {
            sink: Arc::new(sink),
            events: events_rx,
        })
    }
}

struct MockSink {
    state: Arc<MockState>,
    conn: MockConnection,
}

impl FrameSink for MockSink {
    fn send(&self, text: String) -> Result<(), TransportError> {
        if self.conn.closed_by_client.load(Ordering::SeqCst) || self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let auto_pair = *lock(&self.state.auto_pair);
        let is_pair = matches!(decode_frame(&text), Ok(Decoded::Frame(ref frame)) if frame.kind == FrameType::Pair);
        lock(&self.state.sent).push(text);

        if let (true, Some(answer)) = (is_pair, auto_pair) {
            if let Ok(reply) = encode_frame(&FrameType::Paired, &answer) {
                let _ = self.conn.events.send(TransportEvent::Message(reply));
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.conn.closed_by_client.store(true, Ordering::SeqCst);
        let _ = self.conn.events.send(TransportEvent::Closed);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

//! WebSocket transport to a running signer.
//!
//! # Task layout
//!
//! Opening a channel connects with `tokio_tungstenite::connect_async`, splits
//! the stream, and spawns two tasks:
//!
//! ```text
//!   FrameSink::send ─▶ mpsc ─▶ [writer task] ─▶ WebSocket ─▶ signer
//!   reader loop ◀─ mpsc ◀─ [reader task] ◀─ WebSocket ◀─ signer
//! ```
//!
//! `FrameSink::send` never awaits: it only queues onto the writer's channel,
//! which fails once the writer has stopped.  The reader task emits
//! [`TransportEvent::Closed`] when the socket ends for any reason.
//! [`FrameSink::close`] emits it too, so a local close is reported at once
//! rather than after the peer acknowledges.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, warn};

use crate::application::ports::{FrameSink, OpenChannel, SignerTarget, SocketTransport, TransportError, TransportEvent};

/// Opens WebSocket channels with a bounded connect time.
#[derive(Debug, Clone)]
pub struct WsTransport {
    open_timeout: Duration,
}

impl WsTransport {
    pub fn new(open_timeout: Duration) -> Self {
        Self { open_timeout }
    }
}

enum Outbound {
    Text(String),
    Close,
}

#[async_trait]
impl SocketTransport for WsTransport {
    async fn open(&self, target: &SignerTarget) -> Option<OpenChannel> {
        let stream = match timeout(self.open_timeout, connect_async(target.url.as_str())).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                warn!("WebSocket connect to {} failed: {e}", target.url);
                return None;
            }
            Err(_) => {
                warn!("WebSocket connect to {} timed out after {:?}", target.url, self.open_timeout);
                return None;
            }
        };

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // ── Writer ────────────────────────────────────────────────────────────
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Text(text) => {
                        if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                            warn!("WebSocket write failed: {e}");
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_tx.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
        });

        // ── Reader ────────────────────────────────────────────────────────────
        let reader_events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => {
                        if reader_events.send(TransportEvent::Message(text)).is_err() {
                            return;
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        debug!("signer closed the WebSocket");
                        break;
                    }
                    Ok(WsMessage::Binary(_)) => debug!("ignoring binary WebSocket frame"),
                    Ok(_) => {}
                    Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                    Err(e) => {
                        warn!("WebSocket read failed: {e}");
                        break;
                    }
                }
            }
            let _ = reader_events.send(TransportEvent::Closed);
        });

        Some(OpenChannel {
            sink: Arc::new(WsSink {
                outbound: out_tx,
                events: events_tx,
            }),
            events: events_rx,
        })
    }
}

struct WsSink {
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl FrameSink for WsSink {
    fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
        let _ = self.events.send(TransportEvent::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_against_closed_port_returns_none() {
        // Arrange: bind then drop a listener so the port is known to be free.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let transport = WsTransport::new(Duration::from_millis(500));

        // Act
        let channel = transport.open(&SignerTarget::websocket("127.0.0.1", port, "/")).await;

        // Assert
        assert!(channel.is_none());
    }

    #[tokio::test]
    async fn test_exchanges_text_with_websocket_peer() {
        // Arrange: a one-shot echo peer.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if message.is_text() {
                    ws.send(message).await.unwrap();
                }
            }
        });
        let transport = WsTransport::new(Duration::from_secs(2));

        // Act
        let mut channel = transport
            .open(&SignerTarget::websocket("127.0.0.1", port, "/"))
            .await
            .unwrap();
        channel.sink.send("40/chainx".to_string()).unwrap();

        // Assert
        assert_eq!(
            channel.events.recv().await,
            Some(TransportEvent::Message("40/chainx".to_string()))
        );

        channel.sink.close();
        assert_eq!(channel.events.recv().await, Some(TransportEvent::Closed));
    }
}

//! Connection lifecycle: link, reader loop, disconnect, auto-reconnect.
//!
//! ```text
//!  link() ─▶ locate ─▶ open ─▶ "40/chainx" ─▶ spawn reader ─▶ pair(passthrough)
//!                                                 │
//!                          transport closed ◀─────┘
//!                                 │
//!            auto_reconnect && !manual_disconnect ?
//!                                 │ yes
//!                    sleep(reconnect_delay) ─▶ link() ─▶ retry until connected
//! ```
//!
//! Every opened transport gets a generation number.  The reader loop reports
//! the close of *its* generation only, so the close of a transport that a
//! newer `link()` already replaced is ignored.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::ports::{ClientError, TransportEvent};
use super::state::ClientCore;

/// How a `link()` attempt ended when no error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The transport is open; `paired` is the passthrough pairing result.
    Connected { paired: bool },
    /// No transport was adopted: it could not be opened, or a reconnect was
    /// overtaken by `disconnect()`.
    NotConnected,
}

/// Who asked for a link.
///
/// Only a caller's link clears an earlier explicit disconnect; a reconnect
/// gives up as soon as it finds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkTrigger {
    Caller,
    Reconnect,
}

impl LinkOutcome {
    pub fn is_connected(self) -> bool {
        matches!(self, LinkOutcome::Connected { .. })
    }
}

impl ClientCore {
    /// Locates a signer, opens a transport and attempts passthrough pairing.
    ///
    /// # Errors
    ///
    /// - [`ClientError::SignerNotFound`] when the locator finds nothing.
    /// - [`ClientError::Network`] when the opened transport rejects the join
    ///   or pairing frame.
    pub(crate) async fn link(self: &Arc<Self>, trigger: LinkTrigger) -> Result<LinkOutcome, ClientError> {
        let Some(target) = self.locator.locate().await else {
            warn!("no signer is listening on any configured port");
            return Err(ClientError::SignerNotFound);
        };

        if trigger == LinkTrigger::Reconnect && !self.lock().session.should_reconnect() {
            debug!("reconnect abandoned before opening a channel");
            return Ok(LinkOutcome::NotConnected);
        }

        let Some(channel) = self.transport.open(&target).await else {
            warn!("could not open a channel to the signer at {}", target.url);
            return Ok(LinkOutcome::NotConnected);
        };

        let attached = {
            let mut state = self.lock();
            state.attach(channel.sink, trigger)?
        };
        let Some(generation) = attached else {
            return Ok(LinkOutcome::NotConnected);
        };
        info!("connected to signer at {} (connection {generation})", target.url);
        self.spawn_reader(generation, channel.events);

        let paired = self.pair(true).await?;
        Ok(LinkOutcome::Connected { paired })
    }

    /// Closes the transport and suppresses auto-reconnect.  Idempotent.
    pub(crate) fn disconnect(&self) -> bool {
        self.lock().detach();
        true
    }

    fn spawn_reader(self: &Arc<Self>, generation: u64, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Message(text) => core.route_inbound(&text),
                    TransportEvent::Closed => break,
                }
            }
            core.on_transport_closed(generation);
        });
    }

    fn on_transport_closed(self: &Arc<Self>, generation: u64) {
        let reconnect = self.lock().handle_transport_closed(generation);
        if reconnect {
            self.schedule_reconnect();
        }
    }

    /// Retries `link()` every `reconnect_delay` until one connects, the
    /// policy no longer allows reconnecting, or the attempt budget runs out.
    fn schedule_reconnect(self: &Arc<Self>) {
        let core = Arc::clone(self);
        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                tokio::time::sleep(core.reconnect_delay).await;

                let allowed = core.lock().session.should_reconnect();
                if !allowed {
                    debug!("reconnect cancelled");
                    return;
                }

                attempt += 1;
                info!("reconnecting to signer (attempt {attempt})");
                match core.link(LinkTrigger::Reconnect).await {
                    Ok(LinkOutcome::Connected { .. }) => return,
                    Ok(LinkOutcome::NotConnected) => {}
                    Err(e) => debug!("reconnect attempt {attempt} failed: {e}"),
                }

                if core.max_reconnect_attempts.is_some_and(|max| attempt >= max) {
                    warn!("giving up on reconnecting after {attempt} attempts");
                    return;
                }
            }
        });
    }
}

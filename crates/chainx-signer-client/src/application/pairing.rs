//! Pairing handshake.
//!
//! # How pairing works (for beginners)
//!
//! Before a signer answers any call it asks its user whether this
//! application may talk to it.  The client starts that conversation by
//! sending a `pair` frame carrying its appkey and origin; the signer answers
//! with `paired` and a boolean once the user has decided.
//!
//! Several callers may want pairing at the same time: the automatic
//! ("passthrough") attempt right after connecting, plus any API call made
//! while still unpaired.  Only the first of them sends a `pair` frame.  The
//! others join its waiter list and all of them receive the same answer.
//!
//! A negotiation that is cut short (transport lost, or a new link replaces
//! the old one) settles every waiter with `false`.

use chainx_signer_core::protocol::frame::FrameType;
use chainx_signer_core::protocol::messages::PairRequest;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::ports::ClientError;
use super::state::{ClientCore, SessionState};

/// Waiters for the pairing negotiation currently in flight, if any.
#[derive(Debug, Default)]
pub struct PairingSession {
    waiters: Vec<oneshot::Sender<bool>>,
    negotiating: bool,
}

impl PairingSession {
    pub fn is_negotiating(&self) -> bool {
        self.negotiating
    }

    /// Registers a waiter for the outcome.
    ///
    /// The returned flag is `true` when no negotiation was in flight, meaning
    /// the caller is responsible for sending the `pair` frame.
    pub fn join(&mut self) -> (oneshot::Receiver<bool>, bool) {
        let (tx, rx) = oneshot::channel();
        let starts_negotiation = !self.negotiating;
        self.negotiating = true;
        self.waiters.push(tx);
        (rx, starts_negotiation)
    }

    /// Ends the negotiation and hands `accepted` to every waiter.
    ///
    /// Returns how many waiters were settled.
    pub fn settle(&mut self, accepted: bool) -> usize {
        self.negotiating = false;
        let waiters = std::mem::take(&mut self.waiters);
        let count = waiters.len();
        for waiter in waiters {
            // A waiter whose caller gave up has nothing left to notify.
            let _ = waiter.send(accepted);
        }
        count
    }
}

impl SessionState {
    /// Joins or starts a negotiation.  Sends the `pair` frame when starting.
    pub(crate) fn begin_pairing(&mut self, passthrough: bool) -> Result<oneshot::Receiver<bool>, ClientError> {
        let (receiver, starts_negotiation) = self.pairing.join();
        if !starts_negotiation {
            debug!("joining pairing negotiation already in flight");
            return Ok(receiver);
        }

        let request = PairRequest {
            appkey: self.keys.current().as_str().to_string(),
            origin: self.origin(),
            passthrough,
        };
        if let Err(e) = self.send_frame(FrameType::Pair, request) {
            self.pairing.settle(false);
            return Err(e);
        }
        info!(
            "requested pairing with appkey {} (passthrough: {passthrough})",
            self.keys.current().redacted()
        );
        Ok(receiver)
    }

    /// Handles the signer's `paired` answer.
    pub(crate) fn handle_paired(&mut self, accepted: bool) {
        self.session.paired = accepted;
        if accepted {
            self.keys.promote();
        }
        let settled = self.pairing.settle(accepted);
        if settled == 0 {
            info!("signer reported paired={accepted} with no negotiation in flight");
        } else {
            info!("pairing {}", if accepted { "accepted" } else { "declined" });
        }
    }
}

impl ClientCore {
    /// Resolves to whether the signer accepted pairing.
    ///
    /// # Errors
    ///
    /// [`ClientError::Network`] if the `pair` frame could not be sent.
    pub(crate) async fn pair(&self, passthrough: bool) -> Result<bool, ClientError> {
        let receiver = {
            let mut state = self.lock();
            state.begin_pairing(passthrough)?
        };
        Ok(receiver.await.unwrap_or(false))
    }
}

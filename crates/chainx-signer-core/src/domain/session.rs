//! Session flags and the pairing state they imply.
//!
//! ```text
//!             pair()                paired(true)
//!  Unpaired ─────────▶ Pairing ─────────────────▶ Paired
//!     ▲                   │ paired(false)            │
//!     └───────────────────┘◀─────────────────────────┘
//!                          transport loss / rekey
//! ```
//!
//! The appkey is owned by the key lifecycle in the client crate; this struct
//! holds the booleans that gate calls and reconnects.

/// Observable pairing status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Unpaired,
    Pairing,
    Paired,
}

/// Per-client connection and pairing flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub paired: bool,
    pub connected: bool,
    /// Set by an explicit disconnect; suppresses auto-reconnect.
    pub manual_disconnect: bool,
    pub auto_reconnect: bool,
}

impl Session {
    pub fn new(auto_reconnect: bool) -> Self {
        Self {
            paired: false,
            connected: false,
            manual_disconnect: false,
            auto_reconnect,
        }
    }

    /// Records a freshly opened transport.
    ///
    /// `manual_disconnect` is left alone: only an explicit link by the user
    /// clears it, never an automatic reconnect.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Records transport loss.  Trust does not survive the socket.
    pub fn mark_transport_lost(&mut self) {
        self.connected = false;
        self.paired = false;
    }

    /// `true` when a lost transport should be re-linked automatically.
    pub fn should_reconnect(&self) -> bool {
        self.auto_reconnect && !self.manual_disconnect
    }

    /// Derives the pairing state given whether a negotiation is in flight.
    pub fn pairing_state(&self, negotiating: bool) -> PairingState {
        if negotiating {
            PairingState::Pairing
        } else if self.paired {
            PairingState::Paired
        } else {
            PairingState::Unpaired
        }
    }
}

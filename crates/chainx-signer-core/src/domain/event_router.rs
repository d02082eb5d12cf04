//! Push event fan-out.
//!
//! The signer pushes `event` frames (`ACCOUNT_CHANGE`, `TX_STATUS`, …) that
//! are not answers to any call.  [`EventRouter`] maps each event name to an
//! ordered list of handlers and invokes them in registration order.
//!
//! # Removal
//!
//! Every [`add`](EventRouter::add) returns a [`SubscriptionId`].  Removing a
//! single subscriber goes through [`remove`](EventRouter::remove) with that id;
//! wiping every subscriber of a name is a separate, explicit
//! [`clear`](EventRouter::clear), so one caller cannot silently drop another
//! caller's handlers.
//!
//! # Reentrancy
//!
//! Handlers often subscribe or unsubscribe while being dispatched (a
//! transaction-status watcher removes itself once the transaction is final).
//! The owner of the router therefore takes a snapshot with
//! [`handlers`](EventRouter::handlers), releases whatever lock guards the
//! router, and only then calls [`dispatch`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

/// A push event handler.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identity of one subscription, unique within its router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Event name → ordered handlers.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Vec<(SubscriptionId, EventHandler)>>,
    next_id: u64,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `event`.
    pub fn add(&mut self, event: impl Into<String>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(event.into()).or_default().push((id, handler));
        id
    }

    /// Removes the single handler registered under `id`.
    ///
    /// Returns `false` if no such subscription exists for `event`.
    pub fn remove(&mut self, event: &str, id: SubscriptionId) -> bool {
        let Some(list) = self.handlers.get_mut(event) else {
            return false;
        };
        let Some(index) = list.iter().position(|(sub, _)| *sub == id) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            self.handlers.remove(event);
        }
        true
    }

    /// Removes every handler for `event` and returns how many were dropped.
    pub fn clear(&mut self, event: &str) -> usize {
        self.handlers.remove(event).map_or(0, |list| list.len())
    }

    /// Snapshot of the handlers for `event`, in registration order.
    pub fn handlers(&self, event: &str) -> Vec<EventHandler> {
        self.handlers
            .get(event)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }
}

/// Invokes every handler with `payload`, in order.
///
/// A handler that panics is logged and skipped; the remaining handlers still
/// run.  Returns the number of handlers that panicked.
pub fn dispatch(event: &str, handlers: &[EventHandler], payload: &Value) -> usize {
    let mut failed = 0;
    for handler in handlers {
        if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
            warn!("handler for event {event} panicked; continuing with remaining handlers");
            failed += 1;
        }
    }
    failed
}

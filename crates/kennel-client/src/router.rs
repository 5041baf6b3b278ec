//! Listener fan-out for inbound messages.
//!
//! Listeners register against one [`MessageKind`] and are invoked
//! synchronously, in registration order, whenever a message with that tag
//! arrives. A listener that panics is isolated: the panic is caught and
//! logged and every remaining listener still runs.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use kennel_core::ListenerToken;
use kennel_protocol::{Message, MessageKind};

type MessageListener = dyn Fn(&Message) + Send + Sync;

/// Routes inbound messages to listeners by type tag.
#[derive(Default)]
pub struct MessageRouter {
    listeners: Mutex<HashMap<MessageKind, Vec<(ListenerToken, Arc<MessageListener>)>>>,
}

impl MessageRouter {
    /// Empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one message kind.
    ///
    /// The token is the only handle for later removal; registering the
    /// same closure twice yields two independent registrations.
    pub fn on_message(
        &self,
        kind: MessageKind,
        listener: impl Fn(&Message) + Send + Sync + 'static,
    ) -> ListenerToken {
        let token = ListenerToken::new();
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((token.clone(), Arc::new(listener)));
        token
    }

    /// Unregister by token. Returns false when no registration matches.
    pub fn remove_listener(&self, token: &ListenerToken) -> bool {
        let mut listeners = self.listeners.lock();
        for registrations in listeners.values_mut() {
            let before = registrations.len();
            registrations.retain(|(t, _)| t != token);
            if registrations.len() < before {
                return true;
            }
        }
        false
    }

    /// Number of listeners registered for a kind.
    #[must_use]
    pub fn listener_count(&self, kind: MessageKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver a message to every listener registered for its kind.
    ///
    /// Returns how many listeners ran (panicking ones included). A kind
    /// nobody listens for delivers to zero listeners, which is normal.
    pub fn dispatch(&self, message: &Message) -> usize {
        let kind = message.kind();
        // Snapshot so listeners can (un)register from inside a callback.
        let snapshot: Vec<_> = self
            .listeners
            .lock()
            .get(&kind)
            .map(|regs| regs.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                warn!(kind = %kind, "message listener panicked, continuing with remaining listeners");
            }
        }
        snapshot.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

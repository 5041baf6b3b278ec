//! Session role state.
//!
//! Every connection starts as a guest. A verified credential upgrades the
//! role for the life of the connection; disconnecting (or a transport
//! error) drops the session back to guest so a reconnected socket never
//! inherits stale privileges. A rejected credential changes nothing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use kennel_core::{ListenerToken, OwnerId, Role, SessionId};
use kennel_protocol::ErrorBody;

use crate::auth::AuthGrant;
use crate::transport::ConnectionState;

/// Something worth telling session observers about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The underlying connection moved to a new state.
    StateChanged(ConnectionState),
    /// A credential was accepted; the grant is now in effect.
    AuthSucceeded(AuthGrant),
    /// A credential was rejected; the role is unchanged.
    AuthFailed(ErrorBody),
}

type SessionListener = dyn Fn(&SessionEvent) + Send + Sync;

/// Role and scope for one client connection.
pub struct Session {
    id: SessionId,
    role: Mutex<Role>,
    owner_id: Mutex<Option<OwnerId>>,
    last_state: Mutex<ConnectionState>,
    listeners: Mutex<Vec<(ListenerToken, Arc<SessionListener>)>>,
}

impl Session {
    /// Fresh guest session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            role: Mutex::new(Role::Guest),
            owner_id: Mutex::new(None),
            last_state: Mutex::new(ConnectionState::Disconnected),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Identifier of this session.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current role.
    #[must_use]
    pub fn role(&self) -> Role {
        *self.role.lock()
    }

    /// Owner the session is scoped to, when authenticated as a customer.
    #[must_use]
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id.lock().clone()
    }

    /// Register an observer. Events are delivered synchronously in
    /// registration order; the returned token is the only way to
    /// unregister, so the same closure can be registered twice and
    /// removed independently.
    pub fn on_event(
        &self,
        listener: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> ListenerToken {
        let token = ListenerToken::new();
        self.listeners
            .lock()
            .push((token.clone(), Arc::new(listener)));
        token
    }

    /// Unregister by token. Returns false when the token is unknown
    /// (already removed or never issued here).
    pub fn remove_listener(&self, token: &ListenerToken) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(t, _)| t != token);
        listeners.len() < before
    }

    /// Apply a verified grant.
    pub(crate) fn apply_grant(&self, grant: &AuthGrant) {
        *self.role.lock() = grant.role;
        *self.owner_id.lock() = grant.owner_id.clone();
        self.emit(&SessionEvent::AuthSucceeded(grant.clone()));
    }

    /// Record a rejected credential. The role stays where it was.
    pub(crate) fn auth_rejected(&self, error: ErrorBody) {
        self.emit(&SessionEvent::AuthFailed(error));
    }

    /// Fold a connection-state change into the session.
    ///
    /// Repeated reports of the current state are dropped. Leaving the
    /// connected state revokes any earned role before observers hear
    /// about the transition.
    pub(crate) fn connection_changed(&self, state: ConnectionState) {
        {
            let mut last = self.last_state.lock();
            if *last == state {
                return;
            }
            *last = state;
        }
        if matches!(state, ConnectionState::Disconnected | ConnectionState::Error) {
            let was = {
                let mut role = self.role.lock();
                std::mem::replace(&mut *role, Role::Guest)
            };
            *self.owner_id.lock() = None;
            if was != Role::Guest {
                warn!(session = %self.id, previous_role = was.as_str(), "connection lost, session reset to guest");
            }
        }
        self.emit(&SessionEvent::StateChanged(state));
    }

    fn emit(&self, event: &SessionEvent) {
        // Snapshot so listeners can (un)register from inside a callback.
        let snapshot: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(session = %self.id, "session listener panicked, continuing with remaining listeners");
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fresh_session_is_guest() {
        let session = Session::new();
        assert_eq!(session.role(), Role::Guest);
        assert!(session.owner_id().is_none());
    }

    #[test]
    fn grant_upgrades_role_and_scope() {
        let session = Session::new();
        session.apply_grant(&AuthGrant::customer("own_1".into()));
        assert_eq!(session.role(), Role::Customer);
        assert_eq!(session.owner_id().as_deref(), Some("own_1"));

        session.apply_grant(&AuthGrant::admin());
        assert_eq!(session.role(), Role::Admin);
        assert!(session.owner_id().is_none());
    }

    #[test]
    fn rejection_leaves_role_untouched() {
        let session = Session::new();
        session.apply_grant(&AuthGrant::admin());

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        let _token = session.on_event(move |e| seen.lock().push(e.clone()));

        session.auth_rejected(ErrorBody {
            code: "AUTH_FAILED".into(),
            message: "invalid admin key".into(),
            details: None,
        });

        assert_eq!(session.role(), Role::Admin);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SessionEvent::AuthFailed(body) if body.code == "AUTH_FAILED"));
    }

    #[test]
    fn disconnect_resets_to_guest() {
        let session = Session::new();
        session.connection_changed(ConnectionState::Connected);
        session.apply_grant(&AuthGrant::customer("own_2".into()));

        session.connection_changed(ConnectionState::Disconnected);
        assert_eq!(session.role(), Role::Guest);
        assert!(session.owner_id().is_none());
    }

    #[test]
    fn transport_error_also_resets_to_guest() {
        let session = Session::new();
        session.connection_changed(ConnectionState::Connected);
        session.apply_grant(&AuthGrant::admin());

        session.connection_changed(ConnectionState::Error);
        assert_eq!(session.role(), Role::Guest);
    }

    #[test]
    fn repeated_state_reports_are_dropped() {
        let session = Session::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let _token = session.on_event(move |e| {
            if matches!(e, SessionEvent::StateChanged(_)) {
                let _ = seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        session.connection_changed(ConnectionState::Connected);
        session.connection_changed(ConnectionState::Connected);
        session.connection_changed(ConnectionState::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let session = Session::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            let _ = session.on_event(move |_| order.lock().push(n));
        }

        session.connection_changed(ConnectionState::Connecting);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn removed_token_stops_delivery() {
        let session = Session::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let token = session.on_event(move |_| {
            let _ = seen.fetch_add(1, Ordering::SeqCst);
        });

        session.connection_changed(ConnectionState::Connecting);
        assert!(session.remove_listener(&token));
        session.connection_changed(ConnectionState::Connected);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!session.remove_listener(&token), "second removal finds nothing");
    }

    #[test]
    fn panicking_listener_does_not_starve_the_rest() {
        let session = Session::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _ = session.on_event(|_| panic!("listener bug"));
        let seen = Arc::clone(&count);
        let _ = session.on_event(move |_| {
            let _ = seen.fetch_add(1, Ordering::SeqCst);
        });

        session.connection_changed(ConnectionState::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn same_closure_twice_gets_independent_tokens() {
        let session = Session::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = {
            let count = Arc::clone(&count);
            move |_: &SessionEvent| {
                let _ = count.fetch_add(1, Ordering::SeqCst);
            }
        };
        let first = session.on_event(listener.clone());
        let second = session.on_event(listener);
        assert_ne!(first, second);

        session.connection_changed(ConnectionState::Connecting);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(session.remove_listener(&first));
        session.connection_changed(ConnectionState::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

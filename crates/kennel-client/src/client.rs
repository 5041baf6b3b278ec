//! The client facade.
//!
//! [`KennelClient`] owns one persistent connection (when it can get one),
//! the correlator that pairs requests with responses over it, the one-shot
//! fallback executor, the listener router, the session, and a context
//! streamer. Operations go over whichever transport is alive; callers see
//! the same result shapes either way.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use kennel_core::{CorrelationId, Credential, ListenerToken};
use kennel_protocol::{Message, MessageKind, Operation};
use kennel_settings::KennelSettings;

use crate::auth::AuthGrant;
use crate::correlator::{Correlator, InvokeOutcome};
use crate::error::{ClientError, ClientResult};
use crate::fallback::FallbackExecutor;
use crate::router::MessageRouter;
use crate::session::Session;
use crate::streaming::ContextStreamer;
use crate::transport::{ConnectionState, Transport, WsTransport};

/// Client for the realtime layer of the booking platform.
///
/// Construction is cheap and performs no network work;
/// [`connect`](Self::connect) establishes the persistent transport. A
/// client whose transport is down still serves every operation through
/// the one-shot fallback.
pub struct KennelClient {
    ws_url: String,
    correlator: Arc<Correlator>,
    fallback: FallbackExecutor,
    router: Arc<MessageRouter>,
    session: Arc<Session>,
    streamer: ContextStreamer,
    transport: Mutex<Option<Arc<WsTransport>>>,
    /// Last credential the server accepted; replayed by fallback
    /// reauthentication.
    credential: Mutex<Option<Credential>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KennelClient {
    /// Build a client from settings.
    #[must_use]
    pub fn new(settings: &KennelSettings) -> Self {
        Self {
            ws_url: settings.realtime.ws_url.clone(),
            correlator: Arc::new(Correlator::new(settings.realtime.invoke_timeout_ms)),
            fallback: FallbackExecutor::new(settings),
            router: Arc::new(MessageRouter::new()),
            session: Arc::new(Session::new()),
            streamer: ContextStreamer::new(settings),
            transport: Mutex::new(None),
            credential: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Establish the persistent transport.
    ///
    /// Returns the resulting connection state rather than failing: a
    /// client that cannot reach the socket endpoint stays usable in
    /// degraded mode, serving operations over the one-shot fallback.
    /// Connecting while already connected is a no-op.
    pub async fn connect(&self) -> ConnectionState {
        if let Some(transport) = self.transport.lock().clone() {
            if transport.state().is_connected() {
                return ConnectionState::Connected;
            }
        }

        self.session.connection_changed(ConnectionState::Connecting);
        match WsTransport::connect(&self.ws_url).await {
            Ok(transport) => {
                let transport = Arc::new(transport);
                self.spawn_io(&transport);
                *self.transport.lock() = Some(transport);
                info!(url = %self.ws_url, "persistent transport connected");
                ConnectionState::Connected
            }
            Err(e) => {
                warn!(url = %self.ws_url, error = %e, "persistent transport unavailable, continuing in degraded mode");
                self.session.connection_changed(ConnectionState::Error);
                ConnectionState::Error
            }
        }
    }

    fn spawn_io(&self, transport: &Arc<WsTransport>) {
        let mut tasks = self.tasks.lock();

        // Reader: responses settle the correlator, everything else fans
        // out through the router before the next frame is parsed.
        let reader = {
            let transport = Arc::clone(transport);
            let correlator = Arc::clone(&self.correlator);
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                while let Some(text) = transport.recv().await {
                    match serde_json::from_str::<Message>(&text) {
                        Ok(Message::Response(frame)) => correlator.complete(frame),
                        Ok(message) => {
                            let delivered = router.dispatch(&message);
                            trace!(kind = %message.kind(), delivered, "inbound message dispatched");
                        }
                        Err(e) => {
                            warn!(error = %e, len = text.len(), "discarding malformed inbound frame");
                        }
                    }
                }
            })
        };

        // Watcher: connection transitions drive the session (role reset
        // on disconnect lives there).
        let watcher = {
            let mut state_rx = transport.watch_state();
            let session = Arc::clone(&self.session);
            tokio::spawn(async move {
                loop {
                    let state = *state_rx.borrow_and_update();
                    session.connection_changed(state);
                    if state_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
        };

        tasks.push(reader);
        tasks.push(watcher);
    }

    /// Invoke one catalog operation.
    ///
    /// Uses the persistent transport when connected; otherwise the
    /// deterministic one-shot fallback, whose results carry the same
    /// envelope shapes. Degraded results come back as
    /// [`InvokeOutcome::Unknown`].
    ///
    /// # Errors
    /// Invalid parameters, a server-side rejection, or a persistent-path
    /// timeout.
    pub async fn invoke(&self, operation: Operation, data: Value) -> ClientResult<InvokeOutcome> {
        let transport = self.transport.lock().clone();
        if let Some(transport) = transport {
            if transport.state().is_connected() {
                let value = self
                    .correlator
                    .invoke(transport.as_ref(), operation, data)
                    .await?;
                return Ok(InvokeOutcome::Confirmed(value));
            }
        }
        debug!(operation = %operation, "transport down, using one-shot fallback");
        let credential = self.credential.lock().clone();
        self.fallback
            .execute(operation, &data, credential.as_ref())
            .await
    }

    /// Present a credential over the persistent transport.
    ///
    /// On success the session role is upgraded and the credential cached
    /// for fallback reauthentication. On rejection the role is unchanged.
    ///
    /// # Errors
    /// Transport error while disconnected (role upgrades are a
    /// persistent-session concept), rejection by the verifier, or a
    /// deadline elapsing.
    pub async fn authenticate(&self, credential: Credential) -> ClientResult<AuthGrant> {
        let transport = self.transport.lock().clone();
        let transport = transport
            .filter(|t| t.state().is_connected())
            .ok_or_else(|| {
                ClientError::Transport("authenticate requires the persistent transport".into())
            })?;

        let id = CorrelationId::new();
        let message = Message::Auth {
            id: id.clone(),
            credential: credential.clone(),
        };
        match self
            .correlator
            .exchange(transport.as_ref(), id, &message, "authenticate")
            .await
        {
            Ok(value) => {
                let grant: AuthGrant = serde_json::from_value(value)?;
                self.session.apply_grant(&grant);
                *self.credential.lock() = Some(credential);
                info!(role = grant.role.as_str(), "session authenticated");
                Ok(grant)
            }
            Err(ClientError::Remote(body)) => {
                self.session.auth_rejected(body.clone());
                Err(ClientError::Remote(body))
            }
            Err(e) => Err(e),
        }
    }

    /// Register a listener for one inbound message kind.
    pub fn on_message(
        &self,
        kind: MessageKind,
        listener: impl Fn(&Message) + Send + Sync + 'static,
    ) -> ListenerToken {
        self.router.on_message(kind, listener)
    }

    /// Unregister a message listener by token.
    pub fn remove_listener(&self, token: &ListenerToken) -> bool {
        self.router.remove_listener(token)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.transport
            .lock()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |t| t.state())
    }

    /// The session (role, scope, event listeners).
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The message router.
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// The context streamer.
    #[must_use]
    pub fn streamer(&self) -> &ContextStreamer {
        &self.streamer
    }

    /// Number of requests awaiting settlement.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Tear everything down: the persistent transport, the stream, and
    /// the io tasks. The session falls back to guest. Idempotent.
    pub async fn close(&self) {
        let transport = self.transport.lock().take();
        if let Some(transport) = transport {
            transport.close().await;
        }
        self.streamer.disconnect().await;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.session.connection_changed(ConnectionState::Disconnected);
    }
}

impl Drop for KennelClient {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kennel_core::Role;

    fn unreachable_settings() -> KennelSettings {
        let mut settings = KennelSettings::default();
        settings.realtime.ws_url = "ws://127.0.0.1:9/ws".into();
        settings.api.base_url = "http://127.0.0.1:9".into();
        settings.realtime.invoke_timeout_ms = 500;
        settings
    }

    #[tokio::test]
    async fn failed_connect_leaves_client_in_degraded_mode() {
        let client = KennelClient::new(&unreachable_settings());
        assert_eq!(client.connect().await, ConnectionState::Error);
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.session().role(), Role::Guest);
    }

    #[tokio::test]
    async fn degraded_invoke_returns_safe_default() {
        let client = KennelClient::new(&unreachable_settings());
        let _ = client.connect().await;

        let outcome = client
            .invoke(Operation::GetServices, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InvokeOutcome::Unknown(serde_json::json!({"services": []}))
        );
    }

    #[tokio::test]
    async fn authenticate_while_disconnected_is_a_transport_error() {
        let client = KennelClient::new(&unreachable_settings());
        let err = client
            .authenticate(Credential::AdminKey("admin123".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(client.session().role(), Role::Guest);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = KennelClient::new(&unreachable_settings());
        client.close().await;
        client.close().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}

//! The persistent transport seam.
//!
//! [`Transport`] abstracts a long-lived bidirectional connection so the
//! correlator and session logic never touch socket types directly.
//! [`WsTransport`] is the shipped implementation: a WebSocket whose split
//! halves are driven by one background task, bridged to the rest of the
//! client through channels. Connection liveness is published on a `watch`
//! channel so the session observes every transition.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound frames queued per connection before sends start failing.
const OUTBOUND_BUFFER: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Connection state
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness of the persistent connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Frames flow in both directions.
    Connected,
    /// Closed cleanly (by either side) or never established.
    #[default]
    Disconnected,
    /// Torn down by a transport-level failure.
    Error,
}

impl ConnectionState {
    /// Whether frames can currently be sent.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lowercase name, for logs and session events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport trait
// ─────────────────────────────────────────────────────────────────────────────

/// A persistent bidirectional text-frame connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one text frame for delivery to the peer.
    async fn send(&self, text: String) -> ClientResult<()>;

    /// Receive the next inbound text frame. `None` once the connection is
    /// gone and its buffer is drained.
    async fn recv(&self) -> Option<String>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Subscribe to connection state transitions.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// Tear the connection down. Idempotent.
    async fn close(&self);
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket transport
// ─────────────────────────────────────────────────────────────────────────────

/// [`Transport`] over a WebSocket.
///
/// One background task owns both split halves: it forwards queued outbound
/// frames, pushes inbound text into an unbounded channel, and answers
/// protocol pings. Dropping the transport aborts the task, so no connection
/// outlives its handle.
pub struct WsTransport {
    outbound_tx: mpsc::Sender<String>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    io_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Open a WebSocket connection to `url`.
    pub async fn connect(url: &str) -> ClientResult<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state_tx = Arc::new(state_tx);

        debug!(url, "opening websocket");
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(format!("websocket connect failed: {e}")))?;

        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let _ = state_tx.send(ConnectionState::Connected);
        let io_task = tokio::spawn(run_socket(
            ws,
            outbound_rx,
            inbound_tx,
            Arc::clone(&state_tx),
        ));

        Ok(Self {
            outbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            state_tx,
            io_task: Mutex::new(Some(io_task)),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: String) -> ClientResult<()> {
        if !self.state().is_connected() {
            return Err(ClientError::Transport("not connected".into()));
        }
        self.outbound_tx
            .send(text)
            .await
            .map_err(|_| ClientError::Transport("connection closed".into()))
    }

    async fn recv(&self) -> Option<String> {
        self.inbound_rx.lock().await.recv().await
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    async fn close(&self) {
        let _ = self.state_tx.send(ConnectionState::Disconnected);
        if let Some(task) = self.io_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(task) = self.io_task.lock().take() {
            task.abort();
        }
    }
}

/// Drive one WebSocket connection until either side ends it.
async fn run_socket(
    ws: WsStream,
    mut outbound_rx: mpsc::Receiver<String>,
    inbound_tx: mpsc::UnboundedSender<String>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut failed = false;

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                        warn!(error = %e, "websocket send failed");
                        failed = true;
                        break;
                    }
                }
                None => {
                    // Every sender handle is gone — close politely.
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if inbound_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    // Some peers send text frames as binary.
                    match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if inbound_tx.send(text.to_owned()).is_err() {
                                break;
                            }
                        }
                        Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
                    }
                }
                Some(Ok(WsMessage::Ping(payload))) => {
                    let _ = ws_tx.send(WsMessage::Pong(payload)).await;
                }
                Some(Ok(WsMessage::Close(_))) => {
                    debug!("peer sent close frame");
                    break;
                }
                Some(Ok(_)) => {} // pongs and raw frames
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    failed = true;
                    break;
                }
                None => {
                    debug!("websocket stream ended");
                    break;
                }
            },
        }
    }

    let _ = state.send(if failed {
        ConnectionState::Error
    } else {
        ConnectionState::Disconnected
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // Socket behavior is covered end to end in tests/integration.rs; these
    // pin the state vocabulary the session layer depends on.

    #[test]
    fn only_connected_counts_as_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Error.is_connected());
    }

    #[test]
    fn state_names_are_lowercase() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Connected.as_str(), "connected");
        assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionState::Error.as_str(), "error");
    }

    #[test]
    fn default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}

//! Request/response correlation over the persistent transport.
//!
//! Every call registers a pending request keyed by correlation id, sends a
//! tagged frame, and settles from exactly one of two sources: the matching
//! response frame or the deadline. Responses for ids nobody is waiting on
//! are logged and dropped. The pending table is a synchronous mutex and is
//! never held across an await point.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use kennel_core::CorrelationId;
use kennel_protocol::{ErrorBody, Message, Operation, RequestFrame, ResponseFrame, WireError};

use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;

/// How an invoke settled.
///
/// The persistent and fallback paths produce identical result shapes, so
/// the outcome variant is the only way callers can tell a degraded answer
/// from a confirmed one.
#[derive(Clone, Debug, PartialEq)]
pub enum InvokeOutcome {
    /// A transport round trip produced this result.
    Confirmed(Value),
    /// Every path failed; this is the operation's safe default shape.
    /// Treat it as "unknown", never as a confirmed empty result.
    Unknown(Value),
}

impl InvokeOutcome {
    /// The result payload, whichever way it was obtained.
    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Confirmed(value) | Self::Unknown(value) => value,
        }
    }

    /// Consume the outcome, keeping only the payload.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Confirmed(value) | Self::Unknown(value) => value,
        }
    }

    /// Whether a transport round trip actually confirmed this result.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

type Settlement = Result<Value, ErrorBody>;

struct PendingRequest {
    label: String,
    issued_at: Instant,
    reply: oneshot::Sender<Settlement>,
}

/// Pairs outbound frames with inbound responses by correlation id.
pub struct Correlator {
    pending: Mutex<HashMap<CorrelationId, PendingRequest>>,
    timeout_ms: u64,
}

impl Correlator {
    /// Create a correlator whose requests expire after `timeout_ms`.
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout_ms,
        }
    }

    /// Number of requests currently awaiting settlement.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Invoke an operation over the persistent transport and await its
    /// settlement.
    pub async fn invoke(
        &self,
        transport: &dyn Transport,
        operation: Operation,
        data: Value,
    ) -> ClientResult<Value> {
        let frame = RequestFrame::new(operation, data);
        let id = frame.id.clone();
        self.exchange(transport, id, &Message::Request(frame), operation.as_str())
            .await
    }

    /// Send an already-built frame and await the response carrying `id`.
    ///
    /// `label` names the exchange in logs and timeout errors.
    pub(crate) async fn exchange(
        &self,
        transport: &dyn Transport,
        id: CorrelationId,
        message: &Message,
        label: &str,
    ) -> ClientResult<Value> {
        let text = serde_json::to_string(message)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            let _ = pending.insert(
                id.clone(),
                PendingRequest {
                    label: label.to_owned(),
                    issued_at: Instant::now(),
                    reply: reply_tx,
                },
            );
        }

        if let Err(e) = transport.send(text).await {
            let _ = self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), reply_rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(body))) => Err(ClientError::Remote(body)),
            // The correlator never drops a registered sender while the
            // request is pending, so this means the client was torn down.
            Ok(Err(_)) => Err(ClientError::Transport("client closed".into())),
            Err(_) => {
                let _ = self.pending.lock().remove(&id);
                warn!(
                    id = %id,
                    operation = label,
                    timeout_ms = self.timeout_ms,
                    "request deadline elapsed"
                );
                Err(ClientError::Timeout {
                    operation: label.to_owned(),
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }

    /// Settle the pending request matching this response, if any.
    pub fn complete(&self, frame: ResponseFrame) {
        let Some(request) = self.pending.lock().remove(&frame.id) else {
            warn!(id = %frame.id, "response with no matching pending request, dropping");
            return;
        };

        let settlement = if frame.success {
            Ok(frame.result.unwrap_or(Value::Null))
        } else {
            Err(frame
                .error
                .unwrap_or_else(|| WireError::protocol("error response without body").into_body()))
        };

        debug!(
            id = %frame.id,
            operation = %request.label,
            elapsed = ?request.issued_at.elapsed(),
            "request settled"
        );
        if request.reply.send(settlement).is_err() {
            debug!(id = %frame.id, "caller abandoned request before settlement");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Frames of the incremental context-delivery stream.
//!
//! A stream delivers zero or more named payloads ("contexts"), each arriving
//! as a `context` frame, interleaved with optional `info` frames and
//! per-context `error` frames, and terminated by exactly one `complete`
//! frame. Both transport paths — native push stream and manually parsed
//! chunked body — produce these frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame of a context stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContextFrame {
    /// Advisory text from the producer.
    Info {
        /// Message text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// One named payload.
    #[serde(rename_all = "camelCase")]
    Context {
        /// Name of the delivered context.
        context_name: String,
        /// The payload.
        data: Value,
    },
    /// Failure, optionally scoped to one context.
    #[serde(rename_all = "camelCase")]
    Error {
        /// What went wrong.
        error: String,
        /// Context this error is scoped to, if any. An unscoped error
        /// concerns the stream as a whole.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_name: Option<String>,
    },
    /// Terminal frame; no frames follow on this stream.
    Complete {
        /// Closing message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ContextFrame {
    /// Name of the context this frame concerns, if it targets one.
    #[must_use]
    pub fn context_name(&self) -> Option<&str> {
        match self {
            Self::Context { context_name, .. } => Some(context_name),
            Self::Error { context_name, .. } => context_name.as_deref(),
            Self::Info { .. } | Self::Complete { .. } => None,
        }
    }

    /// Whether this frame terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

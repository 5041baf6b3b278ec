//! Client-side error taxonomy.
//!
//! Everything the client can fail with collapses into [`ClientError`].
//! Remote rejections keep their structured [`ErrorBody`] so callers can
//! branch on the wire code; local failures carry plain messages.

use kennel_protocol::ErrorBody;

/// Convenience alias used throughout the crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The persistent transport is down or refused the frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response arrived before the deadline.
    #[error("operation '{operation}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Label of the operation that timed out.
        operation: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The presented credential was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The caller's input was rejected before anything was sent.
    #[error("{0}")]
    Validation(String),

    /// An inbound frame could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote side rejected the operation with a coded error.
    #[error("remote error [{}]: {}", .0.code, .0.message)]
    Remote(ErrorBody),

    /// A one-shot HTTP call failed at the transport level.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Serialization of an outbound frame failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stream ended before the requested context arrived.
    #[error("stream closed before context '{0}' was delivered")]
    StreamClosed(String),

    /// The producer reported a failure scoped to one context.
    #[error("context '{context}' failed: {message}")]
    Context {
        /// The context the failure is scoped to.
        context: String,
        /// What the producer reported.
        message: String,
    },
}

impl ClientError {
    /// Whether this error came from the remote side (vs. a local failure).
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Context { .. })
    }
}

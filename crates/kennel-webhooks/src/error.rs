//! Webhook error taxonomy.

use thiserror::Error;

/// Errors from the webhook registry and dispatcher.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The target is not an absolute http(s) URL.
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),

    /// An event name outside the fixed enumeration.
    #[error("unknown webhook event: {0}")]
    UnknownEvent(String),

    /// No subscription with the given id.
    #[error("webhook subscription not found: {0}")]
    NotFound(String),

    /// A delivery attempt failed. Recorded against the subscription,
    /// never surfaced to the event producer.
    #[error("webhook delivery failed: {0}")]
    Delivery(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Webhook fan-out for Kennel domain events.
//!
//! External systems register an HTTP endpoint for a subset of the fixed
//! event vocabulary and receive signed JSON envelopes as events fire:
//!
//! - [`WebhookRegistry`] — validated in-memory subscription store with
//!   per-delivery bookkeeping; secrets are redacted from every read.
//! - [`WebhookDispatcher`] — fire-and-forget delivery: one spawned POST per
//!   matching subscription, no retry, no backpressure on the producer.
//! - [`signer`] — hex HMAC-SHA256 signatures over the raw envelope bytes.
//! - [`webhook_routes`] — Axum management surface under `/api/webhooks`.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod routes;
pub mod signer;

pub use dispatcher::WebhookDispatcher;
pub use error::WebhookError;
pub use registry::{
    NewSubscription, SubscriptionUpdate, SubscriptionView, WebhookRegistry, WebhookSubscription,
};
pub use routes::{webhook_routes, WebhookState};

//! # kennel-protocol
//!
//! Wire-format types for the Kennel realtime protocol.
//!
//! Everything that crosses a connection boundary is defined here:
//!
//! - **Messages**: the tagged [`Message`] union covering push notifications
//!   and request/response frames
//! - **Frames**: [`RequestFrame`] / [`ResponseFrame`] with correlation ids
//! - **Operations**: the [`Operation`] catalog with its deterministic
//!   fallback call mapping and result envelopes
//! - **Context frames**: [`ContextFrame`] for incremental streaming
//! - **Webhooks**: [`WebhookEvent`] enumeration and delivery envelope
//! - **Errors**: machine-readable [`ErrorCode`] / [`WireError`]
//!
//! All field names are camelCase on the wire; type tags are snake_case.

#![deny(unsafe_code)]

pub mod context;
pub mod error;
pub mod message;
pub mod operations;
pub mod request;
pub mod webhook;

pub use context::ContextFrame;
pub use error::{ErrorCode, WireError};
pub use message::{Message, MessageKind};
pub use operations::{FallbackCall, FallbackMethod, Operation, ALL_OPERATIONS};
pub use request::{ErrorBody, RequestFrame, ResponseFrame};
pub use webhook::{WebhookEnvelope, WebhookEvent, ALL_WEBHOOK_EVENTS};

//! # kennel-core
//!
//! Foundation types for the Kennel realtime layer.
//!
//! This crate provides the shared vocabulary the other Kennel crates depend on:
//!
//! - **Branded IDs**: `CorrelationId`, `SessionId`, `SubscriptionId`,
//!   `ListenerToken`, `OwnerId` as newtypes for type safety
//! - **Roles**: `Role` (guest/customer/admin) and the `Credential` exchanged
//!   to advance a session's role
//! - **Reconnect policy**: fixed-backoff parameters shared by the streaming
//!   deliverer and anything else that replays a connection intent

#![deny(unsafe_code)]

pub mod ids;
pub mod retry;
pub mod role;

pub use ids::{CorrelationId, ListenerToken, OwnerId, SessionId, SubscriptionId};
pub use retry::ReconnectPolicy;
pub use role::{Credential, Role};

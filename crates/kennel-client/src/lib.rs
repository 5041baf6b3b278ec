//! # kennel-client
//!
//! Client runtime for the Kennel realtime protocol.
//!
//! One [`KennelClient`] bundles everything an application needs:
//! - Persistent WebSocket transport with correlated request/response
//!   exchange and a 30 s settlement deadline
//! - Deterministic one-shot HTTP fallback producing identical result
//!   shapes when the socket is down, degrading to safe defaults
//!   (flagged [`InvokeOutcome::Unknown`]) on total failure
//! - Session role tracking: guest until authenticated, reset to guest on
//!   disconnect
//! - Listener fan-out for server-pushed messages, routed by type tag
//! - Incremental context streaming over SSE or a manually parsed chunked
//!   body, with fixed-backoff reconnection

#![deny(unsafe_code)]

pub mod auth;
pub mod client;
pub mod correlator;
pub mod error;
pub mod fallback;
pub mod router;
pub mod session;
pub mod streaming;
pub mod transport;

pub use auth::{AuthGrant, CredentialVerifier, StaticKeyVerifier};
pub use client::KennelClient;
pub use correlator::{Correlator, InvokeOutcome};
pub use error::{ClientError, ClientResult};
pub use fallback::FallbackExecutor;
pub use router::MessageRouter;
pub use session::{Session, SessionEvent};
pub use streaming::{ContextStreamer, StreamIntent, StreamNotice, StreamState};
pub use transport::{ConnectionState, Transport, WsTransport};

//! Protocol error codes.
//!
//! Typed error taxonomy for the realtime layer, eliminating string-based
//! error detection. Each error carries a machine-readable code that survives
//! the wire as a SCREAMING_SNAKE string.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::request::ErrorBody;

// ─────────────────────────────────────────────────────────────────────────────
// Error codes
// ─────────────────────────────────────────────────────────────────────────────

/// Centralized protocol error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Core
    /// Invalid parameters for an operation.
    #[serde(rename = "INVALID_PARAMS")]
    InvalidParams,
    /// Internal error.
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    /// Operation name not in the catalog.
    #[serde(rename = "UNKNOWN_OPERATION")]
    UnknownOperation,
    /// Resource not found.
    #[serde(rename = "NOT_FOUND")]
    NotFound,

    // Transport
    /// The persistent transport failed or is unavailable.
    #[serde(rename = "TRANSPORT_ERROR")]
    TransportError,
    /// A request deadline elapsed with no matching response.
    #[serde(rename = "TIMEOUT")]
    Timeout,
    /// An inbound frame could not be parsed.
    #[serde(rename = "PROTOCOL_ERROR")]
    ProtocolError,

    // Auth
    /// The caller lacks the role required for the operation.
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    /// A presented credential was not recognized.
    #[serde(rename = "AUTH_FAILED")]
    AuthFailed,

    // Webhooks
    /// Registration input failed validation.
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    /// A webhook delivery attempt failed.
    #[serde(rename = "DELIVERY_ERROR")]
    DeliveryError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_else(|_| "UNKNOWN".to_owned());
        // Strip surrounding quotes
        write!(f, "{}", s.trim_matches('"'))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire error
// ─────────────────────────────────────────────────────────────────────────────

/// Typed protocol error: a code plus a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for WireError {}

impl WireError {
    /// Create a new wire error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Invalid parameters.
    #[must_use]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, detail)
    }

    /// Deadline elapsed for an operation.
    #[must_use]
    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Request timed out: {operation}"),
        )
    }

    /// Credential not recognized.
    #[must_use]
    pub fn auth_failed() -> Self {
        Self::new(ErrorCode::AuthFailed, "Authentication failed")
    }

    /// Unparseable inbound frame.
    #[must_use]
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProtocolError, detail)
    }

    /// Transport-level failure.
    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransportError, detail)
    }

    /// Convert into the wire-format error body.
    #[must_use]
    pub fn into_body(self) -> ErrorBody {
        ErrorBody {
            code: self.code.to_string(),
            message: self.message,
            details: None,
        }
    }
}

impl From<WireError> for ErrorBody {
    fn from(err: WireError) -> Self {
        err.into_body()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Request and response frames for the persistent transport.
//!
//! Every invoke over the persistent connection sends a [`RequestFrame`] and
//! settles on the [`ResponseFrame`] carrying the same correlation id. The
//! fallback HTTP path never sees these frames — it produces the same result
//! envelope without them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kennel_core::CorrelationId;

use crate::operations::Operation;

/// Outbound operation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    /// Correlation id, unique among outstanding requests.
    pub id: CorrelationId,
    /// Operation being invoked (kebab-case on the wire).
    pub operation: Operation,
    /// Operation payload.
    pub data: Value,
    /// ISO-8601 issue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl RequestFrame {
    /// Build a frame with a fresh correlation id and the current UTC time.
    #[must_use]
    pub fn new(operation: Operation, data: Value) -> Self {
        Self {
            id: CorrelationId::new(),
            operation,
            data,
            timestamp: Some(now_rfc3339()),
        }
    }
}

/// Inbound response to a [`RequestFrame`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    /// Echoed correlation id.
    pub id: CorrelationId,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result payload (present when `success == true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload (present when `success == false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// ISO-8601 emission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Structured error body inside a [`ResponseFrame`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `AUTH_FAILED`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResponseFrame {
    /// Build a success response.
    pub fn success(id: CorrelationId, result: Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
            timestamp: Some(now_rfc3339()),
        }
    }

    /// Build an error response.
    pub fn error(
        id: CorrelationId,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
            timestamp: Some(now_rfc3339()),
        }
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

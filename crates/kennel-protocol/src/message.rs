//! The tagged message union carried over the persistent transport.
//!
//! Every text frame on the persistent connection parses into exactly one
//! [`Message`]. The `type` tag is the routing key for listener fan-out;
//! domain keys inside the payloads (booking ids, service ids) are for
//! UI-level filtering only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kennel_core::{CorrelationId, Credential};

use crate::request::{RequestFrame, ResponseFrame};

/// All messages exchanged over the persistent transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Free-form notice for display.
    Notification {
        /// Notice text.
        message: String,
        /// ISO-8601 emission time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// A booking changed.
    #[serde(rename_all = "camelCase")]
    BookingUpdate {
        /// Booking that changed.
        booking_id: String,
        /// What happened (`created`, `updated`, `cancelled`, ...).
        action: String,
        /// Status after the change.
        status: String,
        /// ISO-8601 emission time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Availability changed for a service on a date.
    #[serde(rename_all = "camelCase")]
    AvailabilityUpdate {
        /// Affected service.
        service_id: String,
        /// Affected date (ISO date).
        date: String,
        /// ISO-8601 emission time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Loosely-typed state broadcast; fields vary by producer.
    StatusUpdate {
        /// Producer-defined fields.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    /// Server-reported error outside any request/response pair.
    Error {
        /// What went wrong.
        message: String,
        /// ISO-8601 emission time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// An operation request (client → server).
    Request(RequestFrame),
    /// An operation response (server → client).
    Response(ResponseFrame),
    /// A credential exchange (client → server). Settled by an ordinary
    /// [`Response`](Self::Response) frame echoing the same correlation id,
    /// so it shares the pending-request machinery without blocking other
    /// in-flight operations.
    Auth {
        /// Correlation id, unique among outstanding requests.
        id: CorrelationId,
        /// The presented credential, flattened into the frame
        /// (`{"type": "auth", "id": ..., "adminKey": ...}`).
        #[serde(flatten)]
        credential: Credential,
    },
}

impl Message {
    /// The routing kind of this message.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Notification { .. } => MessageKind::Notification,
            Self::BookingUpdate { .. } => MessageKind::BookingUpdate,
            Self::AvailabilityUpdate { .. } => MessageKind::AvailabilityUpdate,
            Self::StatusUpdate { .. } => MessageKind::StatusUpdate,
            Self::Error { .. } => MessageKind::Error,
            Self::Request(_) => MessageKind::Request,
            Self::Response(_) => MessageKind::Response,
            Self::Auth { .. } => MessageKind::Auth,
        }
    }
}

/// Message type tags, used as the fan-out routing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// `notification`
    Notification,
    /// `booking_update`
    BookingUpdate,
    /// `availability_update`
    AvailabilityUpdate,
    /// `status_update`
    StatusUpdate,
    /// `error`
    Error,
    /// `request`
    Request,
    /// `response`
    Response,
    /// `auth`
    Auth,
}

impl MessageKind {
    /// The wire tag for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::BookingUpdate => "booking_update",
            Self::AvailabilityUpdate => "availability_update",
            Self::StatusUpdate => "status_update",
            Self::Error => "error",
            Self::Request => "request",
            Self::Response => "response",
            Self::Auth => "auth",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Operation;
    use assert_matches::assert_matches;
    use serde_json::json;

    // ── Wire format fixture tests ───────────────────────────────────

    #[test]
    fn wire_format_notification() {
        let raw = r#"{"type": "notification", "message": "Booking confirmed"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_matches!(msg, Message::Notification { ref message, .. } if message == "Booking confirmed");
        assert_eq!(msg.kind(), MessageKind::Notification);
    }

    #[test]
    fn wire_format_booking_update() {
        let raw = r#"{"type": "booking_update", "bookingId": "bk_1", "action": "created", "status": "pending"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::BookingUpdate {
            booking_id,
            action,
            status,
            ..
        } = msg
        else {
            panic!("wrong variant");
        };
        assert_eq!(booking_id, "bk_1");
        assert_eq!(action, "created");
        assert_eq!(status, "pending");
    }

    #[test]
    fn wire_format_availability_update() {
        let raw = r#"{"type": "availability_update", "serviceId": "svc_2", "date": "2026-09-01"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::AvailabilityUpdate { service_id, date, .. } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(service_id, "svc_2");
        assert_eq!(date, "2026-09-01");
    }

    #[test]
    fn wire_format_status_update_keeps_arbitrary_fields() {
        let raw = r#"{"type": "status_update", "state": "open", "queueDepth": 3}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::StatusUpdate { fields } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(fields["state"], "open");
        assert_eq!(fields["queueDepth"], 3);
    }

    #[test]
    fn wire_format_error() {
        let raw = r#"{"type": "error", "message": "boom"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_matches!(msg, Message::Error { ref message, .. } if message == "boom");
    }

    #[test]
    fn wire_format_request_embeds_frame() {
        let raw = r#"{"type": "request", "id": "corr_1", "operation": "get-services", "data": {}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::Request(frame) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(frame.id.as_str(), "corr_1");
        assert_eq!(frame.operation, Operation::GetServices);
    }

    #[test]
    fn wire_format_response_embeds_frame() {
        let raw = r#"{"type": "response", "id": "corr_1", "success": true, "result": {"services": []}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::Response(frame) = msg else {
            panic!("wrong variant");
        };
        assert!(frame.success);
        assert_eq!(frame.result.unwrap()["services"], json!([]));
    }

    #[test]
    fn wire_format_auth_admin_key() {
        let raw = r#"{"type": "auth", "id": "corr_3", "adminKey": "admin123"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::Auth { id, credential } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(id.as_str(), "corr_3");
        assert_eq!(credential, Credential::AdminKey("admin123".into()));
    }

    #[test]
    fn wire_format_auth_owner_id() {
        let raw = r#"{"type": "auth", "id": "corr_4", "ownerId": "own_1"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::Auth { credential, .. } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(credential.requested_role(), kennel_core::Role::Customer);
    }

    #[test]
    fn auth_message_flattens_credential() {
        let msg = Message::Auth {
            id: CorrelationId::from("corr_5"),
            credential: Credential::AdminKey("k".into()),
        };
        assert_eq!(msg.kind(), MessageKind::Auth);
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "auth");
        assert_eq!(v["adminKey"], "k");
        assert!(v.get("credential").is_none());
    }

    // ── Serialization ───────────────────────────────────────────────

    #[test]
    fn request_message_serializes_with_tag() {
        let msg = Message::Request(RequestFrame::new(Operation::GetAllPets, json!({})));
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "request");
        assert_eq!(v["operation"], "get-all-pets");
        assert!(v["id"].is_string());
    }

    #[test]
    fn booking_update_serializes_camel_case() {
        let msg = Message::BookingUpdate {
            booking_id: "bk_9".into(),
            action: "updated".into(),
            status: "confirmed".into(),
            timestamp: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"bookingId\":\"bk_9\""));
        assert!(!json.contains("booking_id"));
        assert!(!json.contains("timestamp"));
    }

    #[test]
    fn roundtrip_all_push_kinds() {
        let messages = vec![
            Message::Notification {
                message: "hi".into(),
                timestamp: Some("2026-08-01T00:00:00.000Z".into()),
            },
            Message::BookingUpdate {
                booking_id: "bk_1".into(),
                action: "cancelled".into(),
                status: "cancelled".into(),
                timestamp: None,
            },
            Message::AvailabilityUpdate {
                service_id: "svc_1".into(),
                date: "2026-09-02".into(),
                timestamp: None,
            },
            Message::Error {
                message: "nope".into(),
                timestamp: None,
            },
        ];
        for msg in messages {
            let json = serde_json::to_string(&msg).unwrap();
            let back: Message = serde_json::from_str(&json).unwrap();
            assert_eq!(back.kind(), msg.kind(), "kind changed through {json}");
        }
    }

    // ── Malformed frames ────────────────────────────────────────────

    #[test]
    fn unknown_tag_fails_to_parse() {
        let raw = r#"{"type": "mystery", "message": "?"}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn missing_tag_fails_to_parse() {
        let raw = r#"{"message": "untagged"}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn kind_strings_match_wire_tags() {
        assert_eq!(MessageKind::BookingUpdate.as_str(), "booking_update");
        assert_eq!(MessageKind::StatusUpdate.to_string(), "status_update");
        assert_eq!(
            serde_json::to_string(&MessageKind::AvailabilityUpdate).unwrap(),
            "\"availability_update\""
        );
    }
}

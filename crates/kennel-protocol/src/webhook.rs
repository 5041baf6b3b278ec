//! Webhook event enumeration and delivery envelope.
//!
//! [`WebhookEvent`] is the fixed set of domain events external subscribers
//! may register for; registration rejects anything outside it.
//! [`WebhookEnvelope`] is the exact POST body delivered to subscriber URLs —
//! signatures are computed over its serialized bytes, so field order and
//! names here are load-bearing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Domain events deliverable to webhook subscribers.
///
/// Each variant serializes to a dot-separated string; these strings are the
/// public registration vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    // ── Bookings ─────────────────────────────────────────────────────
    /// A booking was created.
    #[serde(rename = "booking.created")]
    BookingCreated,
    /// A booking was updated.
    #[serde(rename = "booking.updated")]
    BookingUpdated,
    /// A booking was cancelled.
    #[serde(rename = "booking.cancelled")]
    BookingCancelled,
    /// A booking was completed.
    #[serde(rename = "booking.completed")]
    BookingCompleted,

    // ── Availability ─────────────────────────────────────────────────
    /// Availability changed for a service.
    #[serde(rename = "availability.changed")]
    AvailabilityChanged,

    // ── Entities ─────────────────────────────────────────────────────
    /// A pet was created.
    #[serde(rename = "pet.created")]
    PetCreated,
    /// An owner was created.
    #[serde(rename = "owner.created")]
    OwnerCreated,

    // ── Diagnostics ──────────────────────────────────────────────────
    /// Synthetic event emitted by per-subscription test deliveries.
    #[serde(rename = "webhook.test")]
    Test,
}

/// All webhook event variants, for exhaustive testing and the
/// list-event-types management call.
pub const ALL_WEBHOOK_EVENTS: &[WebhookEvent] = &[
    WebhookEvent::BookingCreated,
    WebhookEvent::BookingUpdated,
    WebhookEvent::BookingCancelled,
    WebhookEvent::BookingCompleted,
    WebhookEvent::AvailabilityChanged,
    WebhookEvent::PetCreated,
    WebhookEvent::OwnerCreated,
    WebhookEvent::Test,
];

impl WebhookEvent {
    /// Dot-separated wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookingCreated => "booking.created",
            Self::BookingUpdated => "booking.updated",
            Self::BookingCancelled => "booking.cancelled",
            Self::BookingCompleted => "booking.completed",
            Self::AvailabilityChanged => "availability.changed",
            Self::PetCreated => "pet.created",
            Self::OwnerCreated => "owner.created",
            Self::Test => "webhook.test",
        }
    }

    /// Parse a wire name, returning `None` for anything outside the
    /// enumeration.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        ALL_WEBHOOK_EVENTS
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POST body delivered to a subscriber URL.
///
/// ```json
/// { "event": "booking.created", "timestamp": "2026-...", "data": {...} }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Event that fired.
    pub event: WebhookEvent,
    /// ISO-8601 time the delivery was prepared.
    pub timestamp: String,
    /// Producer payload, passed through untouched.
    pub data: Value,
}

impl WebhookEnvelope {
    /// Build an envelope stamped with the current UTC time.
    #[must_use]
    pub fn new(event: WebhookEvent, data: Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            data,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

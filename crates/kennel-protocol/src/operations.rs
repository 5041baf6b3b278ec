//! The operation catalog and its deterministic fallback mapping.
//!
//! Every RPC-style operation the platform exposes is a variant of
//! [`Operation`]. Each operation has:
//!
//! - a kebab-case wire name (`get-services`)
//! - a fixed fallback call (method + path + body) used when the persistent
//!   transport is down
//! - a result envelope key (`services`) under which both transports deliver
//!   the payload, so callers cannot distinguish transports by shape
//! - a safe default shape for best-effort degradation
//!
//! The fallback mapping is pure data transformation and lives here rather
//! than in the client so both sides of the protocol agree on it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::WireError;

// ─────────────────────────────────────────────────────────────────────────────
// Operation catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Abstract RPC operation names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    // ── Services ─────────────────────────────────────────────────────
    /// List all services.
    GetServices,
    /// Fetch one service by id.
    GetService,
    /// List availability slots for a service on a date.
    GetAvailability,

    // ── Bookings ─────────────────────────────────────────────────────
    /// Create a booking.
    CreateBooking,
    /// Fetch one booking by id.
    GetBooking,
    /// List all bookings.
    GetAllBookings,
    /// Update the status of a booking.
    UpdateBookingStatus,
    /// List bookings for an owner.
    GetBookingsByOwner,
    /// List bookings for a pet.
    GetBookingsByPet,

    // ── Pets ─────────────────────────────────────────────────────────
    /// Create a pet.
    CreatePet,
    /// Fetch one pet by id.
    GetPet,
    /// Update a pet.
    UpdatePet,
    /// List pets belonging to an owner.
    GetPetsByOwner,
    /// List all pets.
    GetAllPets,

    // ── Owners ───────────────────────────────────────────────────────
    /// Create an owner.
    CreateOwner,
    /// Fetch one owner by id.
    GetOwner,
    /// List all owners.
    GetAllOwners,
    /// Update an owner.
    UpdateOwner,
}

/// All operations, for exhaustive testing.
pub const ALL_OPERATIONS: &[Operation] = &[
    Operation::GetServices,
    Operation::GetService,
    Operation::GetAvailability,
    Operation::CreateBooking,
    Operation::GetBooking,
    Operation::GetAllBookings,
    Operation::UpdateBookingStatus,
    Operation::GetBookingsByOwner,
    Operation::GetBookingsByPet,
    Operation::CreatePet,
    Operation::GetPet,
    Operation::UpdatePet,
    Operation::GetPetsByOwner,
    Operation::GetAllPets,
    Operation::CreateOwner,
    Operation::GetOwner,
    Operation::GetAllOwners,
    Operation::UpdateOwner,
];

impl Operation {
    /// Kebab-case wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetServices => "get-services",
            Self::GetService => "get-service",
            Self::GetAvailability => "get-availability",
            Self::CreateBooking => "create-booking",
            Self::GetBooking => "get-booking",
            Self::GetAllBookings => "get-all-bookings",
            Self::UpdateBookingStatus => "update-booking-status",
            Self::GetBookingsByOwner => "get-bookings-by-owner",
            Self::GetBookingsByPet => "get-bookings-by-pet",
            Self::CreatePet => "create-pet",
            Self::GetPet => "get-pet",
            Self::UpdatePet => "update-pet",
            Self::GetPetsByOwner => "get-pets-by-owner",
            Self::GetAllPets => "get-all-pets",
            Self::CreateOwner => "create-owner",
            Self::GetOwner => "get-owner",
            Self::GetAllOwners => "get-all-owners",
            Self::UpdateOwner => "update-owner",
        }
    }

    /// Key under which both transports deliver the result payload.
    #[must_use]
    pub fn envelope_key(self) -> &'static str {
        match self {
            Self::GetServices => "services",
            Self::GetService => "service",
            Self::GetAvailability => "availability",
            Self::CreateBooking | Self::GetBooking | Self::UpdateBookingStatus => "booking",
            Self::GetAllBookings | Self::GetBookingsByOwner | Self::GetBookingsByPet => "bookings",
            Self::CreatePet | Self::GetPet | Self::UpdatePet => "pet",
            Self::GetPetsByOwner | Self::GetAllPets => "pets",
            Self::CreateOwner | Self::GetOwner | Self::UpdateOwner => "owner",
            Self::GetAllOwners => "owners",
        }
    }

    /// Whether the result payload is a collection.
    #[must_use]
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            Self::GetServices
                | Self::GetAvailability
                | Self::GetAllBookings
                | Self::GetBookingsByOwner
                | Self::GetBookingsByPet
                | Self::GetPetsByOwner
                | Self::GetAllPets
                | Self::GetAllOwners
        )
    }

    /// Safe default shape for best-effort degradation.
    ///
    /// Collections degrade to an empty list, single entities to null.
    /// Callers receive this wrapped in an "unknown" outcome, never as a
    /// confirmed result.
    #[must_use]
    pub fn safe_default(self) -> Value {
        if self.is_collection() {
            json!({ self.envelope_key(): [] })
        } else {
            json!({ self.envelope_key(): null })
        }
    }

    /// Deterministic one-shot call equivalent to this operation.
    ///
    /// Path parameters are pulled from `data`; missing ones fail with
    /// `INVALID_PARAMS` before any call is made.
    pub fn fallback_call(self, data: &Value) -> Result<FallbackCall, WireError> {
        let call = match self {
            Self::GetServices => FallbackCall::get("/api/services"),
            Self::GetService => {
                FallbackCall::get(format!("/api/services/{}", require_str(data, "id")?))
            }
            Self::GetAvailability => FallbackCall::get(format!(
                "/api/availability?serviceId={}&date={}",
                require_str(data, "serviceId")?,
                require_str(data, "date")?,
            )),
            Self::CreateBooking => FallbackCall::post("/api/bookings", data.clone()),
            Self::GetBooking => {
                FallbackCall::get(format!("/api/bookings/{}", require_str(data, "id")?))
            }
            Self::GetAllBookings => FallbackCall::get("/api/bookings"),
            Self::UpdateBookingStatus => FallbackCall::new(
                FallbackMethod::Patch,
                format!("/api/bookings/{}/status", require_str(data, "id")?),
                Some(strip_key(data, "id")),
            ),
            Self::GetBookingsByOwner => FallbackCall::get(format!(
                "/api/owners/{}/bookings",
                require_str(data, "ownerId")?
            )),
            Self::GetBookingsByPet => {
                FallbackCall::get(format!("/api/pets/{}/bookings", require_str(data, "petId")?))
            }
            Self::CreatePet => FallbackCall::post("/api/pets", data.clone()),
            Self::GetPet => FallbackCall::get(format!("/api/pets/{}", require_str(data, "id")?)),
            Self::UpdatePet => FallbackCall::new(
                FallbackMethod::Put,
                format!("/api/pets/{}", require_str(data, "id")?),
                Some(strip_key(data, "id")),
            ),
            Self::GetPetsByOwner => {
                FallbackCall::get(format!("/api/owners/{}/pets", require_str(data, "ownerId")?))
            }
            Self::GetAllPets => FallbackCall::get("/api/pets"),
            Self::CreateOwner => FallbackCall::post("/api/owners", data.clone()),
            Self::GetOwner => {
                FallbackCall::get(format!("/api/owners/{}", require_str(data, "id")?))
            }
            Self::GetAllOwners => FallbackCall::get("/api/owners"),
            Self::UpdateOwner => FallbackCall::new(
                FallbackMethod::Put,
                format!("/api/owners/{}", require_str(data, "id")?),
                Some(strip_key(data, "id")),
            ),
        };
        Ok(call)
    }

    /// Reshape a raw fallback result into the persistent-path envelope.
    ///
    /// If the raw value is already an object holding exactly the envelope
    /// key it passes through untouched; anything else is wrapped under the
    /// key. Either way, invoke callers see one shape per operation.
    #[must_use]
    pub fn reshape(self, raw: Value) -> Value {
        let key = self.envelope_key();
        if let Value::Object(ref map) = raw {
            if map.len() == 1 && map.contains_key(key) {
                return raw;
            }
        }
        json!({ key: raw })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fallback call
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP method of a fallback call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackMethod {
    /// GET — reads.
    Get,
    /// POST — creates.
    Post,
    /// PUT — full updates.
    Put,
    /// PATCH — partial updates.
    Patch,
}

impl FallbackMethod {
    /// Method name as sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }
}

/// A one-shot call equivalent to an operation over the persistent path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackCall {
    /// HTTP method.
    pub method: FallbackMethod,
    /// Path (plus query) relative to the API base URL.
    pub path: String,
    /// JSON body, when the method carries one.
    pub body: Option<Value>,
}

impl FallbackCall {
    fn new(method: FallbackMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    fn get(path: impl Into<String>) -> Self {
        Self::new(FallbackMethod::Get, path, None)
    }

    fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(FallbackMethod::Post, path, Some(body))
    }
}

/// Extract a required string field from the operation data.
fn require_str<'a>(data: &'a Value, key: &str) -> Result<&'a str, WireError> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WireError::invalid_params(format!("missing required field: {key}")))
}

/// Clone `data` without one key (used when a field moves into the path).
fn strip_key(data: &Value, key: &str) -> Value {
    match data {
        Value::Object(map) => {
            let stripped: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(stripped)
        }
        other => other.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

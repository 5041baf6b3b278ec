//! Session roles and the credentials that advance them.
//!
//! A session always has exactly one [`Role`]. Every session starts as
//! [`Role::Guest`]; presenting a [`Credential`] is the only way to advance
//! it, and a disconnect resets it back to guest.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::OwnerId;

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Access role attached to a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Anonymous. Every fresh connection starts here.
    #[default]
    Guest,
    /// Authenticated pet owner, bound to an owner id.
    Customer,
    /// Staff role granted by the admin key.
    Admin,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential
// ─────────────────────────────────────────────────────────────────────────────

/// Credential presented to `authenticate`.
///
/// Exactly one of the two forms is ever sent; the enum makes that
/// structural. External tagging produces the wire shapes
/// `{"adminKey": "..."}` and `{"ownerId": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credential {
    /// Shared admin key: a recognized value grants [`Role::Admin`].
    #[serde(rename = "adminKey")]
    AdminKey(String),
    /// Owner id: grants [`Role::Customer`] bound to that id.
    #[serde(rename = "ownerId")]
    Owner(OwnerId),
}

impl Credential {
    /// Role this credential requests (what it grants if verified).
    #[must_use]
    pub fn requested_role(&self) -> Role {
        match self {
            Self::AdminKey(_) => Role::Admin,
            Self::Owner(_) => Role::Customer,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Credential verification and the grant it produces.
//!
//! Verification policy is pluggable: the client only ships the grant shape
//! and a static-key verifier suitable for servers that trust a configured
//! admin key, but any [`CredentialVerifier`] can stand behind an auth
//! endpoint or embedded harness.

use serde::{Deserialize, Serialize};

use kennel_core::{Credential, OwnerId, Role};
use kennel_protocol::{ErrorCode, WireError};

/// The result of a successful credential exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    /// Role the session now holds.
    pub role: Role,
    /// Owner the session is scoped to, when the credential named one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,
}

impl AuthGrant {
    /// Grant for an admin-key credential.
    #[must_use]
    pub fn admin() -> Self {
        Self { role: Role::Admin, owner_id: None }
    }

    /// Grant scoped to one owner's records.
    #[must_use]
    pub fn customer(owner_id: OwnerId) -> Self {
        Self { role: Role::Customer, owner_id: Some(owner_id) }
    }
}

/// Decides whether a presented credential earns a role upgrade.
///
/// A rejection must leave the session untouched; callers only apply the
/// grant on `Ok`.
pub trait CredentialVerifier: Send + Sync {
    /// Verify one credential, producing the grant it earns.
    ///
    /// # Errors
    /// Returns an auth-coded wire error when the credential is rejected.
    fn verify(&self, credential: &Credential) -> Result<AuthGrant, WireError>;
}

/// Verifier backed by a single configured admin key.
///
/// Owner credentials are taken at face value: presenting an owner id
/// scopes the session to that owner without further proof. Deployments
/// wanting stronger owner verification supply their own
/// [`CredentialVerifier`].
pub struct StaticKeyVerifier {
    admin_key: String,
}

impl StaticKeyVerifier {
    /// Build a verifier that accepts exactly `admin_key` for admin.
    #[must_use]
    pub fn new(admin_key: impl Into<String>) -> Self {
        Self { admin_key: admin_key.into() }
    }
}

impl CredentialVerifier for StaticKeyVerifier {
    fn verify(&self, credential: &Credential) -> Result<AuthGrant, WireError> {
        match credential {
            Credential::AdminKey(key) if *key == self.admin_key => Ok(AuthGrant::admin()),
            Credential::AdminKey(_) => Err(WireError::new(ErrorCode::AuthFailed, "invalid admin key")),
            Credential::Owner(owner_id) => Ok(AuthGrant::customer(owner_id.clone())),
        }
    }
}

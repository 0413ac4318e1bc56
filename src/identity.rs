use std::fmt;

use serde::{Deserialize, Serialize};

/// Access tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unrestricted access to every operation and record.
    Admin,
    /// Read-only access scoped to the records the account owns.
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
        }
    }
}

/// The authenticated principal of one request.
///
/// An `Identity` never carries credentials. It is produced by
/// [`CredentialStore::authenticate`](crate::CredentialStore::authenticate)
/// and does not change for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    username: String,
    role: Role,
    owned_resource_id: Option<String>,
}

impl Identity {
    /// Creates an identity.
    ///
    /// An empty `owned_resource_id` is treated as no owned resource.
    pub fn new(username: impl Into<String>, role: Role, owned_resource_id: Option<String>) -> Self {
        Self {
            username: username.into(),
            role,
            owned_resource_id: owned_resource_id.filter(|id| !id.is_empty()),
        }
    }

    /// Shorthand for an Admin identity.
    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Role::Admin, None)
    }

    /// Shorthand for a User identity bound to `owned_resource_id`.
    pub fn user(username: impl Into<String>, owned_resource_id: Option<&str>) -> Self {
        Self::new(username, Role::User, owned_resource_id.map(str::to_string))
    }

    /// Returns the unique username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the id of the Owner record this identity owns, if any.
    pub fn owned_resource_id(&self) -> Option<&str> {
        self.owned_resource_id.as_deref()
    }

    /// Returns true for the Admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

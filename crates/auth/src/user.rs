//! User accounts.

use serde::{Deserialize, Serialize};

use almacen_core::{DomainResult, Entity, UserId, require_email, require_text};

use crate::Role;

/// A stored user account.
///
/// The password hash never leaves the service layer; it is skipped when the
/// record is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub profile: UserProfile,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl User {
    pub fn email(&self) -> &str {
        &self.profile.email
    }

    pub fn role(&self) -> &Role {
        &self.profile.role
    }

    pub fn is_active(&self) -> bool {
        self.profile.active
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// Validated, non-secret user attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_names: String,
    /// Unique, stored lowercase.
    pub email: String,
    pub role: Role,
    pub active: bool,
}

/// Unvalidated user attributes as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInput {
    pub first_name: String,
    pub last_names: String,
    pub email: String,
    pub role: String,
    pub active: Option<bool>,
}

impl UserInput {
    pub fn validate(self) -> DomainResult<UserProfile> {
        Ok(UserProfile {
            first_name: require_text("first name", &self.first_name, 50)?,
            last_names: require_text("last names", &self.last_names, 100)?,
            email: require_email("email", &self.email)?,
            role: Role::parse(&self.role)?,
            active: self.active.unwrap_or(true),
        })
    }
}

/// A validated account ready to be inserted (password already hashed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub profile: UserProfile,
    pub password_hash: String,
}

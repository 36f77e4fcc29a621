use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};

use almacen_core::{DomainError, DomainResult};

/// Role identifier used for RBAC.
///
/// Role names are stored lowercase. The legacy spelling `"administrador"` is
/// folded into [`Role::ADMIN`] wherever a role is constructed, including
/// when a token or stored row is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

const LEGACY_ADMIN: &str = "administrador";

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    /// Canonicalize a role name. Blank names are kept as-is and rejected by
    /// [`Role::parse`].
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("admin") || trimmed.eq_ignore_ascii_case(LEGACY_ADMIN) {
            return Self::ADMIN;
        }
        if trimmed.len() == name.len() && !name.chars().any(|c| c.is_uppercase()) {
            return Self(name);
        }
        Self(Cow::Owned(trimmed.to_lowercase()))
    }

    /// Validate and canonicalize a role supplied by a caller.
    pub fn parse(name: &str) -> DomainResult<Self> {
        let role = Self::new(name.to_string());
        if role.as_str().is_empty() {
            return Err(DomainError::validation("role cannot be empty"));
        }
        if role.as_str().chars().count() > 50 {
            return Err(DomainError::validation("role cannot exceed 50 characters"));
        }
        Ok(role)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        *self == Self::ADMIN
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::new(raw))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

use std::collections::HashSet;

use thiserror::Error;

use almacen_core::UserId;

use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Build a principal, deriving its permissions from the role.
    pub fn new(user_id: UserId, email: impl Into<String>, role: Role) -> Self {
        let permissions = permissions_for(&role);
        Self {
            user_id,
            email: email.into(),
            role,
            permissions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the request boundary).
///
/// The API layer enforces these requirements before calling a service.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Role → permission policy.
///
/// `admin` holds the wildcard. Every other role may work the catalog and
/// record purchases and sales, but cannot manage user accounts.
pub fn permissions_for(role: &Role) -> Vec<Permission> {
    if role.is_admin() {
        return vec![Permission::WILDCARD];
    }
    vec![
        Permission::CATALOG_READ,
        Permission::CATALOG_WRITE,
        Permission::PURCHASES_READ,
        Permission::PURCHASES_WRITE,
        Permission::SALES_READ,
        Permission::SALES_WRITE,
    ]
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

//! Service-level error model shared by the catalog, order and account
//! services.

use thiserror::Error;

use almacen_auth::{AuthzError, JwtError, PasswordError};
use almacen_core::{DomainError, EntityKind};

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed or out-of-range input (bad quantity, empty order, bad id).
    #[error("{0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    /// Uniqueness conflict (duplicate email, duplicate order number).
    #[error("{0}")]
    Conflict(String),

    /// A business rule refused the operation (e.g. stock would go negative).
    #[error("{0}")]
    Invariant(String),

    /// Missing or bad credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Backend failure. The message is for logs, not for clients.
    #[error("{0}")]
    Persistence(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(entity: EntityKind, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Invariant(_) => "invariant_violation",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Persistence(_) => "internal_error",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Invariant(msg),
            DomainError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized => ServiceError::Unauthorized("unauthorized".to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::OutOfRange(msg) => ServiceError::Invariant(msg),
            StoreError::Persistence(msg) => ServiceError::Persistence(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(msg) => ServiceError::Forbidden(msg),
        }
    }
}

impl From<JwtError> for ServiceError {
    fn from(value: JwtError) -> Self {
        match value {
            JwtError::Signing(msg) => ServiceError::Persistence(format!("token signing failed: {msg}")),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(value: PasswordError) -> Self {
        ServiceError::Persistence(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_category() {
        assert_eq!(
            ServiceError::from(DomainError::invalid_id("bad id")),
            ServiceError::Validation("bad id".into())
        );
        assert_eq!(
            ServiceError::from(DomainError::invariant("stock cannot go negative")).code(),
            "invariant_violation"
        );
        assert_eq!(
            ServiceError::from(DomainError::not_found(EntityKind::Product, 7i64)).to_string(),
            "product 7 not found"
        );
    }

    #[test]
    fn store_out_of_range_is_an_invariant_error() {
        assert_eq!(
            ServiceError::from(StoreError::OutOfRange("stock overflow".into())).code(),
            "invariant_violation"
        );
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        assert_eq!(
            ServiceError::from(StoreError::Conflict("duplicate".into())).code(),
            "conflict"
        );
    }
}

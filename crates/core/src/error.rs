//! Domain error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Kind of persisted record, used to say *what* was missing or conflicting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    UnitType,
    Supplier,
    Client,
    User,
    Purchase,
    Sale,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::UnitType => "unit type",
            EntityKind::Supplier => "supplier",
            EntityKind::Client => "client",
            EntityKind::User => "user",
            EntityKind::Purchase => "purchase",
            EntityKind::Sale => "sale",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    /// A uniqueness or state conflict occurred.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: EntityKind, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Require a non-blank string field, returning it trimmed.
pub fn require_text(field: &str, value: &str, max_len: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalize an optional text field: blank becomes `None`, the rest is trimmed.
pub fn optional_text(field: &str, value: Option<&str>, max_len: usize) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => require_text(field, v, max_len).map(Some),
    }
}

/// Require a plausible email address, returning it trimmed and lowercased.
pub fn require_email(field: &str, value: &str) -> DomainResult<String> {
    let email = require_text(field, value, 100)?.to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation(format!("{field} is not a valid email address")));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_entity_and_id() {
        let err = DomainError::not_found(EntityKind::Product, 9999);
        assert_eq!(err.to_string(), "product 9999 not found");
    }

    #[test]
    fn require_text_trims_and_rejects_blank() {
        assert_eq!(require_text("name", "  Arroz ", 100).unwrap(), "Arroz");
        assert!(matches!(
            require_text("name", "   ", 100),
            Err(DomainError::Validation(msg)) if msg == "name cannot be empty"
        ));
        assert!(require_text("name", "abcdef", 5).is_err());
    }

    #[test]
    fn require_email_normalizes_case() {
        assert_eq!(require_email("email", " Ana@Tienda.PE ").unwrap(), "ana@tienda.pe");
        assert!(require_email("email", "ana@tienda").is_err());
        assert!(require_email("email", "@tienda.pe").is_err());
        assert!(require_email("email", "ana tienda@x.pe").is_err());
    }

    #[test]
    fn optional_text_collapses_blank_to_none() {
        assert_eq!(optional_text("phone", Some("  "), 20).unwrap(), None);
        assert_eq!(optional_text("phone", None, 20).unwrap(), None);
        assert_eq!(
            optional_text("phone", Some(" 555-0101 "), 20).unwrap(),
            Some("555-0101".to_string())
        );
    }
}

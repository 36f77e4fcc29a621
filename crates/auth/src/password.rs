//! Password hashing (Argon2id, PHC string format).
//!
//! Accounts imported from the previous system carry bcrypt hashes
//! (`$2a$`, `$2b$`, `$2y$`). Those still verify, and [`needs_rehash`] tells
//! the caller to replace them with Argon2id after a successful login.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

use almacen_core::{DomainError, DomainResult};

const MIN_LEN: usize = 6;
const MAX_LEN: usize = 128;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(String);

/// Check a plaintext password against the length policy.
pub fn validate_password(plain: &str) -> DomainResult<()> {
    let len = plain.chars().count();
    if len < MIN_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_LEN} characters"
        )));
    }
    if len > MAX_LEN {
        return Err(DomainError::validation(format!(
            "password cannot exceed {MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

/// Constant-time verification; an unparseable stored hash never matches.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    if is_bcrypt(stored_hash) {
        return bcrypt::verify(plain, stored_hash).unwrap_or(false);
    }
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// True when `stored_hash` is in a legacy format and should be replaced
/// by [`hash_password`] once the plaintext is known.
pub fn needs_rehash(stored_hash: &str) -> bool {
    is_bcrypt(stored_hash)
}

fn is_bcrypt(stored_hash: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|p| stored_hash.starts_with(p))
}

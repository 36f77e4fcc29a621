//! `almacen-auth` — authentication/authorization boundary.
//!
//! Roles, permissions, token claims and password hashing. This crate is
//! decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize, permissions_for};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use password::{
    PasswordError, hash_password, needs_rehash, validate_password, verify_password,
};
pub use permissions::Permission;
pub use roles::Role;
pub use user::{NewUser, User, UserInput, UserProfile};

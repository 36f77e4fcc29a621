//! API-side authorization guard.
//!
//! Enforced at the request boundary before a service is called, keeping the
//! services themselves auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use almacen_auth::{AuthzError, CommandAuthorization, Permission, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// Permissions an endpoint needs before it may run.
pub struct Requires<'a>(pub &'a [Permission]);

impl CommandAuthorization for Requires<'_> {
    fn required_permissions(&self) -> &[Permission] {
        self.0
    }
}

pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    for perm in command.required_permissions() {
        authorize(principal.principal(), perm)?;
    }
    Ok(())
}

/// Same check, turned into a ready-to-send 403 on failure.
pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), Response> {
    authorize_command(principal, &Requires(std::slice::from_ref(&permission))).map_err(|e| {
        tracing::info!(user_id = %principal.user_id(), error = %e, "request forbidden");
        json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}

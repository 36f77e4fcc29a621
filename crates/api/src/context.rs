use almacen_auth::{Permission, Principal, Role};
use almacen_core::UserId;

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware after the token is verified and the
/// account re-read; handlers behind the middleware can rely on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn email(&self) -> &str {
        &self.principal.email
    }

    pub fn role(&self) -> &Role {
        &self.principal.role
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.principal.permissions
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

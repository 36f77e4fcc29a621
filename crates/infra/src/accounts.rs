//! User accounts: registration, login, token resolution and administration.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use almacen_auth::{
    Hs256JwtValidator, JwtClaims, JwtValidator, NewUser, Principal, User, UserInput, hash_password,
    needs_rehash, validate_password, verify_password,
};
use almacen_core::{EntityKind, UserId, require_email};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Store, UnitOfWork, UserRepository, commit_or_rollback, release};

/// Bearer token handed out on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    tokens: Arc<Hs256JwtValidator>,
    token_ttl: Duration,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<Hs256JwtValidator>, token_ttl: Duration) -> Self {
        Self {
            store,
            tokens,
            token_ttl,
        }
    }

    /// Validator for the tokens this service issues.
    pub fn validator(&self) -> Arc<dyn JwtValidator> {
        self.tokens.clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────

    /// Self-service sign-up. Same rules as [`AccountService::create_user`],
    /// except that the admin role is only granted to the first account;
    /// later admins are created by an admin through the user endpoints.
    pub async fn register(&self, input: UserInput, password: &str) -> ServiceResult<User> {
        let user = self.insert_user(input, password, Registration::Public).await?;
        tracing::info!(user_id = %user.id, role = %user.role(), "user registered");
        Ok(user)
    }

    /// Exchange credentials for a bearer token. Unknown email, wrong
    /// password and disabled account are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AccessToken> {
        let rejected = || ServiceError::unauthorized("incorrect email or password");
        let email = require_email("email", email).map_err(|_| rejected())?;

        let mut uow = self.store.begin().await?;
        let found = uow.find_user_by_email(&email).await.map_err(ServiceError::from);
        let user = release(uow, found).await?.ok_or_else(rejected)?;

        if !verify_password(password, &user.password_hash) {
            tracing::info!(user_id = %user.id, "login rejected: bad password");
            return Err(rejected());
        }
        if !user.is_active() {
            tracing::info!(user_id = %user.id, "login rejected: account disabled");
            return Err(rejected());
        }
        if needs_rehash(&user.password_hash) {
            self.upgrade_password_hash(&user, password).await;
        }

        let now = Utc::now();
        let claims = JwtClaims::new(user.id, user.email(), user.role().clone(), now, self.token_ttl);
        let access_token = self.tokens.issue(&claims)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(AccessToken {
            access_token,
            token_type: "bearer",
            expires_at: now + self.token_ttl,
        })
    }

    /// Replace a legacy hash with the current scheme. A failure leaves the
    /// old hash in place and does not affect the login.
    async fn upgrade_password_hash(&self, user: &User, password: &str) {
        let result: ServiceResult<()> = async {
            let hash = hash_password(password)?;
            let mut uow = self.store.begin().await?;
            let updated = uow
                .update_user(user.id, &user.profile, Some(&hash))
                .await
                .map(|_| ())
                .map_err(ServiceError::from);
            commit_or_rollback(uow, updated).await
        }
        .await;
        match result {
            Ok(()) => tracing::info!(user_id = %user.id, "legacy password hash upgraded"),
            Err(err) => tracing::warn!(user_id = %user.id, error = %err, "password hash upgrade failed"),
        }
    }

    /// Turn verified token claims into a principal, re-reading the account
    /// so that deleted or disabled users lose access immediately and role
    /// changes apply without a new login.
    pub async fn resolve_principal(&self, claims: &JwtClaims) -> ServiceResult<Principal> {
        let mut uow = self.store.begin().await?;
        let found = uow.find_user(claims.sub).await.map_err(ServiceError::from);
        let user = release(uow, found)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("account no longer exists"))?;
        if !user.is_active() {
            return Err(ServiceError::unauthorized("account is disabled"));
        }
        Ok(Principal::new(user.id, user.email(), user.role().clone()))
    }

    pub async fn me(&self, id: UserId) -> ServiceResult<User> {
        self.get_user(id).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Administration
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        let mut uow = self.store.begin().await?;
        let result = uow.list_users().await.map_err(ServiceError::from);
        release(uow, result).await
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<User> {
        let mut uow = self.store.begin().await?;
        let result = require_user(&mut *uow, id).await;
        release(uow, result).await
    }

    /// `None` when no account uses `email`.
    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let email = require_email("email", email)?;
        let mut uow = self.store.begin().await?;
        let found = uow.find_user_by_email(&email).await.map_err(ServiceError::from);
        release(uow, found).await
    }

    pub async fn create_user(&self, input: UserInput, password: &str) -> ServiceResult<User> {
        let user = self.insert_user(input, password, Registration::ByAdmin).await?;
        tracing::info!(user_id = %user.id, role = %user.role(), "user created");
        Ok(user)
    }

    /// Replace a user's profile; the password changes only when one is given.
    pub async fn update_user(
        &self,
        id: UserId,
        input: UserInput,
        password: Option<&str>,
    ) -> ServiceResult<User> {
        let profile = input.validate()?;
        let password_hash = match password.filter(|p| !p.is_empty()) {
            Some(plain) => {
                validate_password(plain)?;
                Some(hash_password(plain)?)
            }
            None => None,
        };

        let mut uow = self.store.begin().await?;
        let result = match uow.update_user(id, &profile, password_hash.as_deref()).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::not_found(EntityKind::User, id)),
            Err(err) => Err(err.into()),
        };
        commit_or_rollback(uow, result).await
    }

    /// Delete an account. Sales it recorded keep their rows without a seller.
    pub async fn delete_user(&self, actor: UserId, id: UserId) -> ServiceResult<()> {
        if actor == id {
            return Err(ServiceError::validation("you cannot delete your own account"));
        }
        let mut uow = self.store.begin().await?;
        let result = match uow.delete_user(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ServiceError::not_found(EntityKind::User, id)),
            Err(err) => Err(err.into()),
        };
        commit_or_rollback(uow, result).await?;
        tracing::info!(user_id = %id, actor = %actor, "user deleted");
        Ok(())
    }

    /// Flip the active flag.
    pub async fn toggle_user_active(&self, actor: UserId, id: UserId) -> ServiceResult<User> {
        if actor == id {
            return Err(ServiceError::validation("you cannot change the status of your own account"));
        }
        let mut uow = self.store.begin().await?;
        let result = async {
            let current = require_user(&mut *uow, id).await?;
            uow.set_user_active(id, !current.is_active())
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::User, id))
        }
        .await;
        commit_or_rollback(uow, result).await
    }

    async fn insert_user(
        &self,
        input: UserInput,
        password: &str,
        registration: Registration,
    ) -> ServiceResult<User> {
        let profile = input.validate()?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let mut uow = self.store.begin().await?;
        let result = async {
            if registration == Registration::Public
                && profile.role.is_admin()
                && !uow.list_users().await?.is_empty()
            {
                tracing::info!(email = %profile.email, "public admin sign-up refused");
                return Err(ServiceError::Forbidden(
                    "only the first account can register as admin".to_string(),
                ));
            }
            uow.insert_user(&NewUser {
                profile,
                password_hash,
            })
            .await
            .map_err(ServiceError::from)
        }
        .await;
        commit_or_rollback(uow, result).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    Public,
    ByAdmin,
}

async fn require_user(uow: &mut dyn UnitOfWork, id: UserId) -> ServiceResult<User> {
    uow.find_user(id)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityKind::User, id))
}

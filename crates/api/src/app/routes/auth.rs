use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use almacen_auth::Permission;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/auth/registro", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/usuarios", get(list_users))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::UserRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let (input, password) = body.into_parts();
    let Some(password) = password else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "password is required");
    };

    match services.accounts.register(input, &password).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match services.accounts.login(&body.correo, &body.contrasena).await {
        Ok(token) => (StatusCode::OK, Json(dto::token_to_json(&token))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.accounts.me(principal.user_id()).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    match services.accounts.list_users().await {
        Ok(users) => {
            let items = users.iter().map(dto::user_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

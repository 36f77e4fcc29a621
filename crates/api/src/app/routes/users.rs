//! User administration. Every endpoint needs `admin.users`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};

use almacen_auth::Permission;
use almacen_core::UserId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/usuarios/", get(list_users).post(create_user))
        .route("/usuarios/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/usuarios/:id/toggle-status", patch(toggle_status))
        .route("/usuarios/buscar/:correo", get(find_by_email))
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

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    let id: UserId = match errors::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.accounts.get_user(id).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::UserRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let (input, password) = body.into_parts();
    let Some(password) = password else {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "password is required");
    };

    match services.accounts.create_user(input, &password).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UserRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    let id: UserId = match errors::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let (input, password) = body.into_parts();

    match services.accounts.update_user(id, input, password.as_deref()).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    let id: UserId = match errors::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.accounts.delete_user(principal.user_id(), id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "Usuario eliminado correctamente" })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn toggle_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    let id: UserId = match errors::parse_id(&id, "user") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.accounts.toggle_user_active(principal.user_id(), id).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn find_by_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(email): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::USERS_MANAGE) {
        return resp;
    }
    match services.accounts.find_by_email(&email).await {
        Ok(Some(user)) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("no user with email {email}")),
        Err(e) => errors::service_error_to_response(e),
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use almacen_auth::Permission;
use almacen_core::ClientId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/clientes/", get(list_clients).post(create_client))
        .route("/clientes/:id", get(get_client).put(update_client))
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    match services.catalog.list_clients().await {
        Ok(clients) => {
            let items = clients.iter().map(dto::client_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    let id: ClientId = match errors::parse_id(&id, "client") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.get_client(id).await {
        Ok(client) => (StatusCode::OK, Json(dto::client_to_json(&client))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::PartyRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match services.catalog.create_client(body.into_client_input()).await {
        Ok(client) => (StatusCode::CREATED, Json(dto::client_to_json(&client))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::PartyRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: ClientId = match errors::parse_id(&id, "client") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match services.catalog.update_client(id, body.into_client_input()).await {
        Ok(client) => (StatusCode::OK, Json(dto::client_to_json(&client))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

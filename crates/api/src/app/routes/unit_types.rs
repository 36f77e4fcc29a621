use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use almacen_auth::Permission;
use almacen_core::UnitTypeId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/tipo-unidad/", get(list_unit_types).post(create_unit_type))
        .route("/tipo-unidad/:id", delete(delete_unit_type))
}

pub async fn list_unit_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    match services.catalog.list_unit_types().await {
        Ok(units) => {
            let items = units.iter().map(dto::unit_type_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_unit_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::UnitTypeRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match services.catalog.create_unit_type(&body.nombre).await {
        Ok(unit) => (StatusCode::CREATED, Json(dto::unit_type_to_json(&unit))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Products that used the unit keep existing without one.
pub async fn delete_unit_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: UnitTypeId = match errors::parse_id(&id, "unit type") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.delete_unit_type(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "Unidad eliminada correctamente" })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

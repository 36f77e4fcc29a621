use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use almacen_auth::Permission;
use almacen_core::{ProductId, SupplierId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/proveedores/", get(list_suppliers).post(create_supplier))
        .route("/proveedores/:id", get(get_supplier).put(update_supplier))
        .route("/proveedores/:id/productos/:producto_id", post(link_product))
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    match services.catalog.list_suppliers().await {
        Ok(suppliers) => {
            let items = suppliers.iter().map(dto::supplier_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// One supplier together with the products it provides.
pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    let id: SupplierId = match errors::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.get_supplier(id).await {
        Ok(found) => (StatusCode::OK, Json(dto::supplier_with_products_to_json(&found))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_supplier(
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
    match services.catalog.create_supplier(body.into_supplier_input()).await {
        Ok(supplier) => (StatusCode::CREATED, Json(dto::supplier_to_json(&supplier))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::PartyRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: SupplierId = match errors::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match services.catalog.update_supplier(id, body.into_supplier_input()).await {
        Ok(supplier) => (StatusCode::OK, Json(dto::supplier_to_json(&supplier))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn link_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, product_id)): Path<(String, String)>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: SupplierId = match errors::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.link_product(id, product_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "Producto vinculado al proveedor" })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

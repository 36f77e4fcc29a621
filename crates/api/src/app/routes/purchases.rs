use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use almacen_auth::Permission;
use almacen_core::{OrderKind, PurchaseId};
use almacen_purchasing::NewPurchase;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/compras/", get(list_purchases).post(create_purchase))
        .route("/compras/siguiente-numero", get(next_number))
        .route("/compras/:id", get(get_purchase))
}

/// Record a purchase: allocates the order number, stores header and lines
/// and adds every line's quantity to stock, all or nothing.
pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::PurchaseRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::PURCHASES_WRITE) {
        return resp;
    }
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.orders.create_purchase(NewPurchase::from(body)).await {
        Ok(receipt) => (StatusCode::CREATED, Json(dto::purchase_receipt_to_json(&receipt))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::PURCHASES_READ) {
        return resp;
    }
    match services.orders.list_purchases().await {
        Ok(purchases) => {
            let items = purchases.iter().map(dto::purchase_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::PURCHASES_READ) {
        return resp;
    }
    let id: PurchaseId = match errors::parse_id(&id, "purchase") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.get_purchase(id).await {
        Ok(purchase) => (StatusCode::OK, Json(dto::purchase_to_json(&purchase))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Provisional next number; the number actually assigned is decided when
/// the purchase is created.
pub async fn next_number(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::PURCHASES_READ) {
        return resp;
    }
    match services.orders.preview_next_number(OrderKind::Purchase).await {
        Ok(preview) => (StatusCode::OK, Json(dto::preview_to_json(&preview))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

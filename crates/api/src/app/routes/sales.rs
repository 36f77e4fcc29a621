use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use almacen_auth::Permission;
use almacen_core::{OrderKind, SaleId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/ventas/", get(list_sales).post(create_sale))
        .route("/ventas/siguiente-numero", get(next_number))
        .route("/ventas/:id", get(get_sale))
}

/// Record a sale and take every line's quantity out of stock.
pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::SaleRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::SALES_WRITE) {
        return resp;
    }
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.orders.create_sale(body.into_new_sale(principal.user_id())).await {
        Ok(receipt) => (StatusCode::CREATED, Json(dto::sale_receipt_to_json(&receipt))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::SALES_READ) {
        return resp;
    }
    match services.orders.list_sales().await {
        Ok(sales) => {
            let items = sales.iter().map(dto::sale_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::SALES_READ) {
        return resp;
    }
    let id: SaleId = match errors::parse_id(&id, "sale") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.orders.get_sale(id).await {
        Ok(sale) => (StatusCode::OK, Json(dto::sale_to_json(&sale))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn next_number(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, Permission::SALES_READ) {
        return resp;
    }
    match services.orders.preview_next_number(OrderKind::Sale).await {
        Ok(preview) => (StatusCode::OK, Json(dto::preview_to_json(&preview))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, FromRequest, Multipart, Path, Request},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};

use almacen_auth::Permission;
use almacen_core::{ProductId, SupplierId};

use crate::app::images::UploadedImage;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/productos/", get(list_products).post(create_product))
        .route("/productos/:id", get(get_product).put(update_product))
        .route("/productos/proveedor/:proveedor_id", get(list_by_supplier))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    match services.catalog.list_products().await {
        Ok(products) => {
            let items = products.iter().map(dto::product_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Create a product from a JSON body or a multipart form with an optional
/// `imagen` file.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    req: Request,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let mut body = match read_product_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let stored_image = match store_image(&services, &mut body).await {
        Ok(reference) => reference,
        Err(resp) => return resp,
    };
    let (input, initial_stock, supplier) = body.request.into_parts();

    match services.catalog.create_product(input, initial_stock, supplier).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => {
            discard_image(&services, stored_image).await;
            errors::service_error_to_response(e)
        }
    }
}

/// Replace a product's attributes. A `stock` field in the body is ignored:
/// stock only moves through purchases and sales. Without a new image the
/// current one is kept.
pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    req: Request,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut body = match read_product_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let stored_image = match store_image(&services, &mut body).await {
        Ok(reference) => reference,
        Err(resp) => return resp,
    };
    let (input, _stock, supplier) = body.request.into_parts();

    match services.catalog.update_product(id, input, supplier).await {
        Ok(product) => (StatusCode::OK, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => {
            discard_image(&services, stored_image).await;
            errors::service_error_to_response(e)
        }
    }
}

struct ProductBody {
    request: dto::ProductRequest,
    image: Option<UploadedImage>,
}

async fn read_product_body(req: Request) -> Result<ProductBody, Response> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        let request = errors::json_body(Json::<dto::ProductRequest>::from_request(req, &()).await)?;
        return Ok(ProductBody { request, image: None });
    }

    let bad_form = |message: String| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", message);
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|rejection| bad_form(rejection.body_text()))?;

    let mut fields = dto::FormFields::new();
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| bad_form(e.body_text()))? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        if name == "imagen" && file_name.is_some() {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| bad_form(e.body_text()))?;
            // Browsers send an empty, nameless part when no file was picked.
            if !bytes.is_empty() && file_name.as_deref().is_some_and(|f| !f.is_empty()) {
                image = Some(UploadedImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }
        let value = field.text().await.map_err(|e| bad_form(e.body_text()))?;
        fields.insert(name, value);
    }

    let request = dto::ProductRequest::from_form(&fields).map_err(bad_form)?;
    Ok(ProductBody { request, image })
}

/// Write an uploaded file and point the request at it.
async fn store_image(services: &AppServices, body: &mut ProductBody) -> Result<Option<String>, Response> {
    let Some(upload) = body.image.take() else {
        return Ok(None);
    };
    let reference = services.images.save(&upload).await.map_err(|e| e.into_response())?;
    body.request.imagen = Some(reference.clone());
    Ok(Some(reference))
}

async fn discard_image(services: &AppServices, reference: Option<String>) {
    if let Some(reference) = reference {
        services.images.discard(&reference).await;
    }
}

pub async fn list_by_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(supplier_id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, Permission::CATALOG_READ) {
        return resp;
    }
    let supplier_id: SupplierId = match errors::parse_id(&supplier_id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.list_products_by_supplier(supplier_id).await {
        Ok(products) => {
            let items = products.iter().map(dto::product_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

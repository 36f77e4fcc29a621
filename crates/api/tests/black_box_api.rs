use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use almacen_api::app::{build_app, services::AppServices};
use almacen_auth::{JwtClaims, Role};
use almacen_core::UserId;
use almacen_infra::AppConfig;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    images_dir: std::path::PathBuf,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let images_dir = std::env::temp_dir().join(format!("almacen-api-images-{}", uuid::Uuid::now_v7()));
        let config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "IMAGES_DIR" => Some(images_dir.display().to_string()),
            _ => None,
        })
        .expect("test config");
        let app = build_app(AppServices::in_memory(&config), &config.cors_origin);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            images_dir,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    /// Register an account through the public endpoint and log it in.
    async fn sign_up(&self, email: &str, role: &str) -> (i64, String) {
        let res = self
            .client
            .post(self.url("/auth/registro"))
            .json(&json!({
                "nombre": "Ana",
                "apellidos": "Torres Vega",
                "correo": email,
                "rol": role,
                "contraseña": "clave123",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let user: Value = res.json().await.unwrap();

        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "correo": email, "contraseña": "clave123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let token: Value = res.json().await.unwrap();
        (
            user["id"].as_i64().unwrap(),
            token["access_token"].as_str().unwrap().to_string(),
        )
    }

    async fn seed_supplier_and_product(&self, token: &str, stock: i64) -> (i64, i64) {
        let (status, supplier) = self
            .post(token, "/proveedores/", json!({ "nombre": "Distribuidora Norte" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let supplier_id = supplier["id"].as_i64().unwrap();

        let (status, product) = self
            .post(
                token,
                "/productos/",
                json!({
                    "nombre": "Arroz Costeño 1kg",
                    "precio_venta": 4.2,
                    "stock": stock,
                    "proveedor_id": supplier_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{product}");
        (supplier_id, product["id"].as_i64().unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_dir_all(&self.images_dir);
    }
}

fn mint_jwt(secret: &str, user_id: i64, role: &str, issued_at: chrono::DateTime<Utc>) -> String {
    let claims = JwtClaims::new(
        UserId::new(user_id),
        "someone@tienda.pe",
        Role::new(role.to_string()),
        issued_at,
        ChronoDuration::minutes(10),
    );

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_and_db_status_are_public() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/db-status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/productos/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn forged_expired_and_orphaned_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let (admin_id, _) = srv.sign_up("admin@tienda.pe", "admin").await;

    let forged = mint_jwt("other-secret", admin_id, "admin", Utc::now());
    let expired = mint_jwt(JWT_SECRET, admin_id, "admin", Utc::now() - ChronoDuration::hours(1));
    let orphan = mint_jwt(JWT_SECRET, 9999, "admin", Utc::now());

    for token in [forged, expired, orphan] {
        let (status, _) = srv.get(&token, "/auth/me").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let valid = mint_jwt(JWT_SECRET, admin_id, "admin", Utc::now());
    let (status, me) = srv.get(&valid, "/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["correo"], "admin@tienda.pe");
}

#[tokio::test]
async fn registration_canonicalizes_legacy_admin_role() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.sign_up("jefe@tienda.pe", "Administrador").await;

    let (status, me) = srv.get(&token, "/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["rol"], "admin");

    let (status, users) = srv.get(&token, "/usuarios/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn public_sign_up_cannot_claim_admin_once_an_account_exists() {
    let srv = TestServer::spawn().await;
    let (_, admin_token) = srv.sign_up("dueno@tienda.pe", "admin").await;

    let res = srv
        .client
        .post(srv.url("/auth/registro"))
        .json(&json!({
            "nombre": "Eva",
            "apellidos": "Rojas",
            "correo": "eva@tienda.pe",
            "rol": "admin",
            "contraseña": "clave123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let (status, users) = srv.get(&admin_token, "/usuarios/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let srv = TestServer::spawn().await;
    srv.sign_up("ana@tienda.pe", "vendedor").await;

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "correo": "ana@tienda.pe", "contraseña": "equivocada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_cannot_manage_users() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.sign_up("vendedor@tienda.pe", "vendedor").await;

    let (status, body) = srv.get(&token, "/usuarios/").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = srv.get(&token, "/productos/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let srv = TestServer::spawn().await;
    let (admin_id, token) = srv.sign_up("admin@tienda.pe", "admin").await;

    let res = srv
        .client
        .delete(srv.url(&format!("/usuarios/{admin_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn purchase_numbers_order_and_adds_stock() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.sign_up("admin@tienda.pe", "admin").await;
    let (supplier_id, product_id) = srv.seed_supplier_and_product(&token, 0).await;

    let (status, preview) = srv.get(&token, "/compras/siguiente-numero").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["numero_orden"], "0000001");
    assert_eq!(preview["provisional"], true);

    let (status, receipt) = srv
        .post(
            &token,
            "/compras/",
            json!({
                "proveedor_id": supplier_id,
                "productos": [{ "producto_id": product_id, "cantidad": 5, "precio_unitario": 2.50 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["orden_compra"], "0000001");
    assert_eq!(receipt["total"], 12.5);

    let (_, product) = srv.get(&token, &format!("/productos/{product_id}")).await;
    assert_eq!(product["stock"], 5);

    let purchase_id = receipt["id"].as_i64().unwrap();
    let (status, purchase) = srv.get(&token, &format!("/compras/{purchase_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(purchase["orden_compra"], "0000001");
    assert_eq!(purchase["proveedor"]["nombre"], "Distribuidora Norte");
    assert_eq!(purchase["detalles"][0]["producto"]["id"], product_id);
    assert_eq!(purchase["detalles"][0]["cantidad"], 5);
    assert_eq!(purchase["detalles"][0]["total"], 12.5);

    let (_, second) = srv
        .post(
            &token,
            "/compras/",
            json!({
                "proveedor_id": supplier_id,
                "productos": [{ "producto_id": product_id, "cantidad": 1, "precio_unitario": 2.50 }],
            }),
        )
        .await;
    assert_eq!(second["orden_compra"], "0000002");

    let (_, list) = srv.get(&token, "/compras/").await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn sale_with_missing_product_changes_nothing() {
    let srv = TestServer::spawn().await;
    let (seller_id, token) = srv.sign_up("admin@tienda.pe", "admin").await;
    let (_, product_id) = srv.seed_supplier_and_product(&token, 10).await;
    let (status, client) = srv
        .post(&token, "/clientes/", json!({ "nombre": "Bodega Rosita", "documento": "45678912" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(client["tipo_documento"], "DNI");
    let client_id = client["id"].as_i64().unwrap();

    let (status, body) = srv
        .post(
            &token,
            "/ventas/",
            json!({
                "cliente_id": client_id,
                "detalles": [
                    { "producto_id": product_id, "cantidad": 2, "precio_unitario": 10.0 },
                    { "producto_id": 9999, "cantidad": 1, "precio_unitario": 5.0 },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, product) = srv.get(&token, &format!("/productos/{product_id}")).await;
    assert_eq!(product["stock"], 10);
    let (_, sales) = srv.get(&token, "/ventas/").await;
    assert!(sales.as_array().unwrap().is_empty());

    let (status, receipt) = srv
        .post(
            &token,
            "/ventas/",
            json!({
                "cliente_id": client_id,
                "detalles": [{ "producto_id": product_id, "cantidad": 2, "precio_unitario": 10.0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["orden_venta"], "0000001");
    assert_eq!(receipt["total"], 20.0);

    let sale_id = receipt["id"].as_i64().unwrap();
    let (_, sale) = srv.get(&token, &format!("/ventas/{sale_id}")).await;
    assert_eq!(sale["vendedor"]["id"], seller_id);
    assert_eq!(sale["cliente"]["documento"], "45678912");

    let (_, product) = srv.get(&token, &format!("/productos/{product_id}")).await;
    assert_eq!(product["stock"], 8);
}

#[tokio::test]
async fn malformed_orders_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.sign_up("admin@tienda.pe", "admin").await;
    let (supplier_id, product_id) = srv.seed_supplier_and_product(&token, 0).await;

    let (status, body) = srv
        .post(
            &token,
            "/compras/",
            json!({
                "proveedor_id": supplier_id,
                "productos": [{ "producto_id": product_id, "cantidad": 0, "precio_unitario": 1.0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = srv
        .post(&token, "/compras/", json!({ "proveedor_id": supplier_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv
        .post(
            &token,
            "/compras/",
            json!({
                "proveedor_id": supplier_id,
                "productos": [{ "producto_id": product_id, "cantidad": 1, "precio_unitario": 100000000.0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let (_, purchases) = srv.get(&token, "/compras/").await;
    assert_eq!(purchases.as_array().unwrap().len(), 0);

    let (status, body) = srv.get(&token, "/compras/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

fn png_part(file_name: &str, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap()
}

#[tokio::test]
async fn product_form_upload_stores_the_image() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.sign_up("admin@tienda.pe", "admin").await;
    let (supplier_id, _) = srv.seed_supplier_and_product(&token, 0).await;

    let form = reqwest::multipart::Form::new()
        .text("nombre", "Galletas Soda Field")
        .text("precio_venta", "1.50")
        .text("stock", "12")
        .text("tUnidad", "")
        .text("proveedor_id", supplier_id.to_string())
        .part("imagen", png_part("soda.png", "image/png"));
    let res = srv
        .client
        .post(srv.url("/productos/"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let product: Value = res.json().await.unwrap();
    assert_eq!(product["stock"], 12);
    let image = product["imagen"].as_str().unwrap().to_string();
    assert!(image.starts_with("/images/") && image.ends_with(".png"), "{image}");
    let file = srv.images_dir.join(image.trim_start_matches("/images/"));
    assert_eq!(std::fs::read(&file).unwrap(), vec![0x89, b'P', b'N', b'G']);

    let (_, by_supplier) = srv.get(&token, &format!("/productos/proveedor/{supplier_id}")).await;
    assert_eq!(by_supplier.as_array().unwrap().len(), 2);

    // Editing without a new file keeps the stored image.
    let id = product["id"].as_i64().unwrap();
    let res = srv
        .client
        .put(srv.url(&format!("/productos/{id}")))
        .bearer_auth(&token)
        .multipart(reqwest::multipart::Form::new().text("nombre", "Galletas Soda Field x6"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["nombre"], "Galletas Soda Field x6");
    assert_eq!(updated["imagen"], image.as_str());
}

#[tokio::test]
async fn product_form_rejects_non_image_files() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.sign_up("admin@tienda.pe", "admin").await;

    let form = reqwest::multipart::Form::new()
        .text("nombre", "Cuaderno")
        .part("imagen", png_part("notas.txt", "text/plain"));
    let res = srv
        .client
        .post(srv.url("/productos/"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let (_, products) = srv.get(&token, "/productos/").await;
    assert_eq!(products.as_array().unwrap().len(), 0);
    assert!(!srv.images_dir.exists());
}

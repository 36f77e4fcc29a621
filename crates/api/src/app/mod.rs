//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: store selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request bodies and JSON mapping helpers
//! - `errors.rs`: consistent error responses
//! - `images.rs`: product image uploads

use std::sync::Arc;

use axum::{Extension, Router, http::HeaderValue};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod images;
pub mod routes;
pub mod services;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Build the full HTTP router (used by `main.rs` and the black-box tests).
pub fn build_app(services: services::AppServices, cors_origin: &str) -> Router {
    let auth_state = middleware::AuthState {
        accounts: services.accounts.clone(),
    };
    let services = Arc::new(services);

    // Protected routes: require a valid token for an active account.
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origin)),
        )
}

fn cors_layer(origin: &str) -> CorsLayer {
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|_| {
        tracing::warn!(origin, "CORS_ORIGIN is not a valid header value; using {DEFAULT_CORS_ORIGIN}");
        HeaderValue::from_static(DEFAULT_CORS_ORIGIN)
    });
    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

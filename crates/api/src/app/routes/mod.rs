use axum::{Router, routing::get};

pub mod auth;
pub mod clients;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod suppliers;
pub mod system;
pub mod unit_types;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/db-status", get(system::db_status))
        .merge(auth::public_router())
}

/// Endpoints behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .merge(auth::protected_router())
        .merge(users::router())
        .merge(products::router())
        .merge(unit_types::router())
        .merge(suppliers::router())
        .merge(clients::router())
        .merge(purchases::router())
        .merge(sales::router())
}

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Round trip to the store.
pub async fn db_status(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let backend = services.store.backend();
    match services.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "backend": backend,
                "message": "database connection ok",
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, backend, "store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "error",
                    "backend": backend,
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

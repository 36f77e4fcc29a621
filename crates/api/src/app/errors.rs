use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use almacen_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Invariant(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::Persistence(detail) => {
            tracing::error!(error = %detail, "request failed in the store");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code(),
                "internal server error",
            );
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Unwrap a JSON body, answering 400 with the standard error body when it
/// is malformed or misses fields.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text()))
}

/// Parse a numeric path id.
pub fn parse_id<T: From<i64>>(raw: &str, what: &str) -> Result<T, Response> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(T::from)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

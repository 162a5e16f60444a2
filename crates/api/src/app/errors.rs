use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use labstock_auth::AuthError;
use labstock_infra::InventoryError;

pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    let status = match &err {
        InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
        InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::Conflict(_) => StatusCode::CONFLICT,
        InventoryError::StoreLocked(_) | InventoryError::LockTimeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        InventoryError::PartialWrite { .. } | InventoryError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut body = json!({
        "ok": false,
        "error": err.code(),
        "message": err.to_string(),
        "retryable": err.is_retryable(),
    });
    if let InventoryError::PartialWrite {
        intent_id,
        completed,
        failed,
        ..
    } = &err
    {
        body["intent_id"] = json!(intent_id.to_string());
        body["completed"] = json!(completed);
        body["failed"] = json!(failed);
    }

    if status.is_server_error() {
        tracing::warn!(code = err.code(), error = %err, "request failed");
    }

    (status, axum::Json(body)).into_response()
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
        }
        AuthError::Hashing(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "auth_error", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "ok": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

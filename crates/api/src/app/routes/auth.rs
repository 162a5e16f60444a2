use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;

use labstock_auth::Authenticator;

use crate::app::routes::common::ApiJson;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/login/", post(login))
}

pub async fn login(
    Extension(auth): Extension<Arc<dyn Authenticator>>,
    ApiJson(body): ApiJson<dto::LoginRequest>,
) -> axum::response::Response {
    let authenticated = tokio::task::spawn_blocking(move || {
        auth.authenticate(&body.username, &body.password)
    })
    .await;

    match authenticated {
        Ok(Ok(principal)) => {
            tracing::info!(username = %principal.username, role = %principal.role.as_str(), "login");
            (
                StatusCode::OK,
                Json(json!({
                    "ok": true,
                    "username": principal.username,
                    "role": principal.role,
                    "site": principal.site,
                })),
            )
                .into_response()
        }
        Ok(Err(err)) => errors::auth_error_to_response(err),
        Err(join) => {
            tracing::error!(error = %join, "login aborted");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "auth_error", "login aborted")
        }
    }
}

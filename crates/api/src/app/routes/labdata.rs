use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;

use labstock_infra::LabServices;
use labstock_infra::services::LabSample;

use crate::app::routes::common::{blocking, ApiJson};

pub fn router() -> Router {
    Router::new().route("/save/", post(save_sample))
}

pub async fn save_sample(
    Extension(services): Extension<Arc<LabServices>>,
    ApiJson(body): ApiJson<LabSample>,
) -> axum::response::Response {
    match blocking(move || services.samples.record(&body)).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(resp) => resp,
    }
}

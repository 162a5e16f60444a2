use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use labstock_infra::{InventoryResult, LabServices};
use labstock_inventory::{Movement, MovementDraft};

use crate::app::dto;
use crate::app::routes::common::{blocking, ApiJson};

pub fn router() -> Router {
    Router::new()
        .route("/arrival/", post(record_arrival))
        .route("/dispatch/", post(record_dispatch))
        .route("/history/", get(list_history))
}

pub async fn record_arrival(
    Extension(services): Extension<Arc<LabServices>>,
    ApiJson(body): ApiJson<dto::ArrivalRequest>,
) -> axum::response::Response {
    match body.into_draft(dto::recorded_now()) {
        Ok(draft) => record(services, draft).await,
        Err(resp) => resp,
    }
}

pub async fn record_dispatch(
    Extension(services): Extension<Arc<LabServices>>,
    ApiJson(body): ApiJson<dto::DispatchRequest>,
) -> axum::response::Response {
    match body.into_draft(dto::recorded_now()) {
        Ok(draft) => record(services, draft).await,
        Err(resp) => resp,
    }
}

async fn record(services: Arc<LabServices>, draft: MovementDraft) -> axum::response::Response {
    match blocking(move || services.movements.record(draft)).await {
        Ok(movement) => (StatusCode::CREATED, Json(recorded(&movement))).into_response(),
        Err(resp) => resp,
    }
}

fn recorded(movement: &Movement) -> serde_json::Value {
    json!({
        "ok": true,
        "tanker_number": movement.tanker_id,
        "movement_type": movement.movement_type().as_str(),
        "recorded_at": movement.recorded_at,
    })
}

/// Every history row, oldest first, as `{ok, history: [...]}`.
///
/// Older clients read this route as a bare array; they must now take the
/// rows from `history`.
pub async fn list_history(
    Extension(services): Extension<Arc<LabServices>>,
) -> axum::response::Response {
    let listed = blocking(move || -> InventoryResult<Vec<dto::HistoryView>> {
        services
            .movements
            .history()?
            .map(|h| h.map(dto::HistoryView::from))
            .collect()
    })
    .await;

    match listed {
        Ok(history) => (StatusCode::OK, Json(json!({ "ok": true, "history": history }))).into_response(),
        Err(resp) => resp,
    }
}

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use labstock_core::RequestId;
use labstock_infra::{InventoryResult, LabServices};
use labstock_inventory::{Decision, RequestStatus};

use crate::app::dto;
use crate::app::routes::common::{blocking, ApiJson, ApiQuery};

pub fn router() -> Router {
    Router::new()
        .route("/balance/", get(list_balances))
        .route("/borrow/", post(create_request))
        .route("/requests/", get(list_requests))
        .route("/approve/", post(decide_request))
        .route("/add-stock/", post(add_stock))
}

pub async fn list_balances(
    Extension(services): Extension<Arc<LabServices>>,
) -> axum::response::Response {
    match blocking(move || services.overview.balances()).await {
        Ok(balances) => {
            let balances: Vec<dto::BalanceView> = balances.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(json!({ "ok": true, "balances": balances }))).into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn add_stock(
    Extension(services): Extension<Arc<LabServices>>,
    ApiJson(body): ApiJson<dto::AddStockRequest>,
) -> axum::response::Response {
    let receipt = match body.into_receipt() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match blocking(move || services.intake.receive(&receipt)).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "material": outcome.material,
                "new_balance": outcome.new_balance,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn create_request(
    Extension(services): Extension<Arc<LabServices>>,
    ApiJson(body): ApiJson<dto::BorrowRequestBody>,
) -> axum::response::Response {
    let input = match body.into_new_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match blocking(move || services.requests.create(&input)).await {
        Ok(request) => (
            StatusCode::CREATED,
            Json(json!({
                "ok": true,
                "request_id": request.request_id.to_string(),
                "status": request.status.as_str(),
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_requests(
    Extension(services): Extension<Arc<LabServices>>,
    ApiQuery(query): ApiQuery<dto::RequestsQuery>,
) -> axum::response::Response {
    let listed = blocking(move || -> InventoryResult<Vec<dto::RequestView>> {
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(RequestStatus::from_str(s)?),
        };
        services
            .requests
            .list(status)?
            .map(|r| r.map(dto::RequestView::from))
            .collect()
    })
    .await;

    match listed {
        Ok(requests) => (StatusCode::OK, Json(json!({ "ok": true, "requests": requests }))).into_response(),
        Err(resp) => resp,
    }
}

pub async fn decide_request(
    Extension(services): Extension<Arc<LabServices>>,
    ApiJson(body): ApiJson<dto::ApproveRequest>,
) -> axum::response::Response {
    let decided = blocking(move || -> InventoryResult<_> {
        let request_id = RequestId::from_str(&body.request_id)?;
        let decision = Decision::from_str(&body.action)?;
        services
            .requests
            .decide(&request_id, decision, &body.approved_by)
    })
    .await;

    match decided {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "request_id": outcome.request.request_id.to_string(),
                "status": outcome.request.status.as_str(),
                "new_balance": outcome.new_balance,
            })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;

use labstock_infra::InventoryResult;

use crate::app::errors;

/// `Json<T>` whose rejections use the `{ok, error, message}` body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            )),
        }
    }
}

/// `Query<T>` whose rejections use the `{ok, error, message}` body.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            )),
        }
    }
}

/// Run a store operation on the blocking pool and map its failure to a response.
///
/// A panicking operation surfaces as `store_error` instead of taking the
/// server down.
pub async fn blocking<T, F>(op: F) -> Result<T, axum::response::Response>
where
    F: FnOnce() -> InventoryResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(errors::inventory_error_to_response(err)),
        Err(join) => {
            tracing::error!(error = %join, "store operation aborted");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "operation aborted",
            ))
        }
    }
}

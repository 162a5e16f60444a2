//! HTTP route modules, one per area, mounted under `/api`.

use axum::Router;

pub mod auth;
pub mod common;
pub mod inventory;
pub mod labdata;
pub mod system;
pub mod tanker;

pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/inventory", inventory::router())
        .nest("/labdata", labdata::router())
        .nest("/tanker", tanker::router())
}

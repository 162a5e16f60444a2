//! HTTP API application wiring.
//!
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and response mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use labstock_auth::Authenticator;
use labstock_infra::LabServices;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<LabServices>, auth: Arc<dyn Authenticator>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(services))
                .layer(Extension(auth)),
        )
}

//! HTTP API: router, handlers and JSON mapping for the lab services.

pub mod app;

//! HTTP route handlers for the control surface.
//!
//! Two routes: a liveness probe and the container reset. Responses are never
//! cacheable. Request tracing is enabled via middleware that generates a
//! unique request ID for each incoming request, allowing correlation of all
//! logs within a request, including init script output.

pub mod health;
pub mod reset;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use axum::http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Cache-Control value for every response
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/reset/{container}", post(reset::reset))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

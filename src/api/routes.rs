use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use super::handlers::{health, readings, AppState};
use crate::ws::ws_handler;

pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/api/data", post(readings::ingest))
        .route("/api/last", get(readings::latest))
        .route("/ws", get(ws_handler))
        .with_state(state);

    apply_layers(router)
}

/// Tracing, permissive CORS, and panic isolation: a panicking handler turns
/// into a 500 for that request only.
pub fn apply_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CACHE_CONTROL, "no-store")],
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

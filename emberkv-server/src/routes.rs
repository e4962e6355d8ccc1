//! Router assembly.

use crate::handlers::{delete_handler, get_handler, health_handler, set_handler, AppState};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Builds the router over the shared cache state.
///
/// Endpoints:
/// - `POST /set?key=&value=&ttl=` — bind a key (400 on bad params)
/// - `GET /get?key=` — look up a key (404 on miss)
/// - `DELETE /delete?key=` — remove a key (succeeds when absent)
/// - `GET /health` — liveness probe
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/set", post(set_handler))
        .route("/get", get(get_handler))
        .route("/delete", delete(delete_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub mod health;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::quota;
use crate::sessions::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Only the trigger is metered.
    let gated = Router::new()
        .route(
            "/api/v1/sessions/:id/analyze",
            post(handlers::handle_analyze),
        )
        .route_layer(from_fn_with_state(state.clone(), quota::enforce));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/sessions/:id/updates", get(handlers::handle_updates))
        .route("/api/v1/sessions/:id/results", get(handlers::handle_results))
        .merge(gated)
        .with_state(state)
}

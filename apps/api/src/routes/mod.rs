pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::controller::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Browser form
        .route("/", get(handlers::handle_index).post(handlers::handle_submit))
        // JSON API
        .route("/api/v1/actions", post(handlers::handle_action))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

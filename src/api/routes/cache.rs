// src/api/routes/cache.rs
use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::cache;
use crate::api::state::AppState;
use crate::cache::invalidate_handler;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache::stats))
        .route("/cache/flush", post(cache::flush))
        .route(
            "/cache/invalidate",
            invalidate_handler(state.cache.clone(), None),
        )
}

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::api::state::AppState;
use crate::cache::CacheStats;

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    stats: CacheStats,
    hit_rate: f64,
    local_hit_rate: f64,
}

#[derive(Serialize)]
pub struct FlushResponse {
    deleted: usize,
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    Json(StatsResponse {
        stats,
        hit_rate: stats.hit_rate(),
        local_hit_rate: stats.local_hit_rate(),
    })
}

pub async fn flush(State(state): State<AppState>) -> Response {
    match state.cache.flush().await {
        Ok(deleted) => Json(FlushResponse { deleted }).into_response(),
        Err(e) => {
            error!("清空快取失敗: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to flush: {}", e)).into_response()
        }
    }
}

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::api::state::AppState;
use crate::redis::RedisPool;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    local_tier: bool,
    distributed_tier: bool,
    /// 未配置 Redis 時省略
    #[serde(skip_serializing_if = "Option::is_none")]
    redis: Option<RedisHealth>,
}

#[derive(Serialize)]
pub struct RedisHealth {
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u128>,
    connections: usize,
    idle_connections: usize,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let redis = match &state.redis {
        Some(pool) => {
            let ping = pool.ping().await;
            if let Err(e) = &ping {
                warn!("Redis 健康檢查失敗: {}", e);
            }
            let (connections, idle_connections) = pool.connections();
            Some(RedisHealth {
                healthy: ping.is_ok(),
                latency_ms: ping.ok().map(|latency| latency.as_millis()),
                connections,
                idle_connections,
            })
        }
        None => None,
    };

    // Redis 不可用時讀取仍可回源，服務降級而非失敗
    let status = match &redis {
        Some(redis) if !redis.healthy => "degraded",
        _ => "ok",
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        local_tier: state.cache.has_local(),
        distributed_tier: state.cache.has_distributed(),
        redis,
    })
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

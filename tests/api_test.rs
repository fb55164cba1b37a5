mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    routing::get,
    Router,
};
use common::two_tier_cache;
use gpu_proxy::api::{AppState, RestApi};
use gpu_proxy::config::{HttpCacheSettings, RedisConfig, ServerConfig};
use gpu_proxy::redis::ConnectionPool;
use serde_json::Value;
use tower::ServiceExt;

fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8080,
        request_timeout_secs: 5,
    }
}

fn http_cache_settings(enabled: bool) -> HttpCacheSettings {
    HttpCacheSettings {
        enabled,
        ttl_secs: 60,
        key_strategy: "default".to_string(),
        user_id_header: "x-user-id".to_string(),
    }
}

fn build(enabled: bool, calls: Arc<AtomicUsize>) -> Router {
    let (cache, _) = two_tier_cache("api_test");
    let state = AppState::new(Arc::new(cache));
    let api = RestApi::new(server_config(), http_cache_settings(enabled), state);

    let service_routes = Router::new().route(
        "/offers",
        get(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                "[]"
            }
        }),
    );
    api.build_app(service_routes)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let x_cache = response
        .headers()
        .get("x-cache")
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, x_cache, body)
}

#[tokio::test]
async fn test_health() {
    let app = build(true, Arc::new(AtomicUsize::new(0)));
    let (status, _, body) = call(&app, Method::GET, "/system/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["local_tier"], true);
    assert_eq!(json["distributed_tier"], true);
    assert!(json.get("redis").is_none());
}

#[tokio::test]
async fn test_health_degraded_when_redis_unreachable() {
    let (cache, _) = two_tier_cache("api_test");
    let pool = ConnectionPool::new(&RedisConfig {
        url: "redis://127.0.0.1:1".to_string(),
        pool_size: 1,
        connection_timeout_secs: 1,
        scan_count: 100,
    })
    .unwrap();
    let state = AppState::new(Arc::new(cache)).with_redis(Arc::new(pool));
    let app = RestApi::new(server_config(), http_cache_settings(true), state).build_app(Router::new());

    let (status, _, body) = call(&app, Method::GET, "/system/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["redis"]["healthy"], false);
    assert!(json["redis"].get("latency_ms").is_none());
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let app = build(true, Arc::new(AtomicUsize::new(0)));
    let (status, _, _) = call(&app, Method::GET, "/system/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_service_routes_get_response_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = build(true, calls.clone());

    let (status, x_cache, _) = call(&app, Method::GET, "/offers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("MISS"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (status, x_cache, body) = call(&app, Method::GET, "/offers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(x_cache.as_deref(), Some("HIT"));
    assert_eq!(body, b"[]");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 管理路由不經過回應快取
    let (_, x_cache, body) = call(&app, Method::GET, "/cache/stats").await;
    assert_eq!(x_cache, None);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_requests"], 2);
    assert_eq!(json["local_hits"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_response_cache_disabled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = build(false, calls.clone());

    for _ in 0..2 {
        let (_, x_cache, _) = call(&app, Method::GET, "/offers").await;
        assert_eq!(x_cache, None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_flush_endpoint() {
    let app = build(true, Arc::new(AtomicUsize::new(0)));

    let (status, _, body) = call(&app, Method::POST, "/cache/flush").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["deleted"].is_u64());
}

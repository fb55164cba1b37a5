// src/api/rest.rs
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Request, middleware, Router};
use tokio::net::TcpListener;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::info;

use super::{routes::api_routes, state::AppState};
use crate::cache::{
    default_key_builder, hash_key_builder, response_cache_layer, user_aware_key_builder,
    HttpCache, KeyBuilder,
};
use crate::config::{HttpCacheSettings, ServerConfig};

/// 未帶用戶識別標頭的請求共用此識別
const ANONYMOUS_USER: &str = "anonymous";

pub struct RestApi {
    server_config: ServerConfig,
    http_cache_settings: HttpCacheSettings,
    state: AppState,
}

impl RestApi {
    pub fn new(
        server_config: ServerConfig,
        http_cache_settings: HttpCacheSettings,
        state: AppState,
    ) -> Self {
        Self {
            server_config,
            http_cache_settings,
            state,
        }
    }

    /// 啟動服務器，直到 `shutdown` 完成
    ///
    /// `service_routes` 為上層服務的路由，啟用時會掛載 HTTP 回應快取。
    pub async fn start<F>(self, service_routes: Router<AppState>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.build_app(service_routes);
        let addr = self.server_config.bind_address();

        info!("Starting REST API server on {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }

    pub fn build_app(&self, service_routes: Router<AppState>) -> Router {
        let service_routes = match self.http_cache() {
            Some(http_cache) => {
                info!(
                    "HTTP 回應快取已啟用，TTL: {:?}，鍵策略: {}",
                    http_cache.ttl(),
                    self.http_cache_settings.key_strategy
                );
                service_routes.layer(middleware::from_fn_with_state(
                    http_cache,
                    response_cache_layer,
                ))
            }
            None => service_routes,
        };

        Router::new()
            .merge(api_routes(&self.state))
            .merge(service_routes)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(false))
                    .on_response(DefaultOnResponse::new()),
            )
            .layer(TimeoutLayer::new(self.server_config.request_timeout()))
            .with_state(self.state.clone())
    }

    fn http_cache(&self) -> Option<HttpCache> {
        if !self.http_cache_settings.enabled || !self.state.cache.config().is_enabled() {
            return None;
        }
        Some(HttpCache::new(
            self.state.cache.clone(),
            self.http_cache_settings.ttl(),
            Some(key_builder_for(&self.http_cache_settings)),
        ))
    }
}

/// 依配置的策略選擇鍵生成器
pub fn key_builder_for(settings: &HttpCacheSettings) -> KeyBuilder {
    match settings.key_strategy.to_lowercase().as_str() {
        "hash" => Arc::new(hash_key_builder),
        "user" => {
            let header_name = settings.user_id_header.clone();
            user_aware_key_builder(move |request: &Request| {
                request
                    .headers()
                    .get(header_name.as_str())
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| !value.is_empty())
                    .unwrap_or(ANONYMOUS_USER)
                    .to_string()
            })
        }
        _ => Arc::new(default_key_builder),
    }
}

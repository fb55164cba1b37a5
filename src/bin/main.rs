use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::Router;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gpu_proxy::api::{AppState, RestApi};
use gpu_proxy::cache::{CacheConfig, DistributedStore, MultiLevelCache};
use gpu_proxy::config::{ApplicationConfig, Environment, LogConfig};
use gpu_proxy::redis::{ConnectionPool, RedisPool, RedisStore};

/// GPU 代理快取服務
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 配置目錄，覆蓋 CONFIG_DIR
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// 以生產環境配置啟動，覆蓋 GPU_PROXY_ENV
    #[arg(long)]
    production: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化配置
    let env = if cli.production {
        Environment::Production
    } else {
        Environment::from_env()
    };
    let app_config = match &cli.config_dir {
        Some(dir) => ApplicationConfig::load_from(dir, env)?,
        None => ApplicationConfig::load(env)?,
    };

    // 初始化日誌系統
    init_logging(&app_config.log)?;
    info!("配置加載完成，環境: {:?}", env);

    // 安裝 Prometheus 記錄器
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow!("無法安裝 Prometheus 記錄器: {}", e))?;

    // 建立多層快取
    let cache_config = CacheConfig::from(&app_config.cache);
    let redis_pool = if cache_config.distributed_enabled {
        let pool = Arc::new(ConnectionPool::new(&app_config.redis)?);
        match pool.ping().await {
            Ok(latency) => info!("Redis 連接正常，延遲 {:?}", latency),
            Err(e) => warn!("Redis 暫時不可用，分散式層讀取將視為未命中: {}", e),
        }
        Some(pool)
    } else {
        None
    };
    let distributed = redis_pool.as_ref().map(|pool| {
        Arc::new(RedisStore::with_scan_count(
            pool.clone(),
            app_config.redis.scan_count,
        )) as Arc<dyn DistributedStore>
    });
    let cache = Arc::new(MultiLevelCache::from_config(cache_config, distributed)?);

    let mut state = AppState::new(cache.clone()).with_metrics(metrics_handle);
    if let Some(pool) = redis_pool {
        state = state.with_redis(pool);
    }

    // 啟動 REST API，服務路由由上層掛載
    let rest_api = RestApi::new(
        app_config.server.clone(),
        app_config.http_cache.clone(),
        state,
    );
    rest_api.start(Router::new(), shutdown_signal()).await?;

    cache.close()?;
    info!("伺服器已關閉");
    Ok(())
}

// 等待關閉信號
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("接收到關閉信號，正在退出..."),
        Err(err) => error!("無法監聽關閉信號: {}", err),
    }
}

// 初始化日誌系統
fn init_logging(log_config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_config.level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if log_config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("設置日誌系統失敗: {}", e))?;

    info!("日誌系統初始化完成");
    Ok(())
}

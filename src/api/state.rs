use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::cache::MultiLevelCache;
use crate::redis::ConnectionPool;

/// API 處理器共享狀態
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<MultiLevelCache>,
    /// 分散式層使用的連接池，用於健康檢查
    pub redis: Option<Arc<ConnectionPool>>,
    /// 未安裝 Prometheus 記錄器時為 `None`
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(cache: Arc<MultiLevelCache>) -> Self {
        Self {
            cache,
            redis: None,
            metrics: None,
        }
    }

    pub fn with_redis(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.redis = Some(pool);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

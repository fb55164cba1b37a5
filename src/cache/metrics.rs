use metrics::{counter, histogram};
use std::time::Duration;

/// 監控指標命名空間
pub const METRIC_NAMESPACE: &str = "gpu_proxy_cache";

/// 監控指標類型
#[derive(Debug, Clone, Copy)]
pub enum MetricType {
    Hit { layer: &'static str },
    Miss { layer: &'static str },
    Latency { operation: &'static str },
    Error { operation: &'static str, layer: &'static str },
}

/// 快取監控指標記錄器
pub struct CacheMetrics;

impl CacheMetrics {
    /// 記錄快取指標
    ///
    /// # Arguments
    /// * `metric_type` - 指標類型
    /// * `duration` - 可選的持續時間，用於延遲指標
    pub fn record(metric_type: MetricType, duration: Option<Duration>) {
        match metric_type {
            MetricType::Hit { layer } => {
                counter!(format!("{}.hit", METRIC_NAMESPACE), "layer" => layer).increment(1);
            }
            MetricType::Miss { layer } => {
                counter!(format!("{}.miss", METRIC_NAMESPACE), "layer" => layer).increment(1);
            }
            MetricType::Latency { operation } => {
                if let Some(dur) = duration {
                    histogram!(
                        format!("{}.latency_ns", METRIC_NAMESPACE),
                        "operation" => operation
                    )
                    .record(dur.as_nanos() as f64);
                }
            }
            MetricType::Error { operation, layer } => {
                counter!(
                    format!("{}.error", METRIC_NAMESPACE),
                    "operation" => operation,
                    "layer" => layer
                )
                .increment(1);
            }
        }
    }

    /// 記錄回源次數
    pub fn record_source_fetch() {
        counter!(format!("{}.source_fetch", METRIC_NAMESPACE)).increment(1);
    }

    /// 記錄快取設定操作
    pub fn record_set() {
        counter!(format!("{}.set", METRIC_NAMESPACE)).increment(1);
    }

    /// 記錄刪除操作
    pub fn record_delete() {
        counter!(format!("{}.delete", METRIC_NAMESPACE)).increment(1);
    }

    /// 記錄模式失效刪除的鍵數
    pub fn record_invalidation(deleted: usize) {
        counter!(format!("{}.invalidate", METRIC_NAMESPACE)).increment(1);
        counter!(format!("{}.invalidated_keys", METRIC_NAMESPACE)).increment(deleted as u64);
    }

    /// 記錄快取清空操作
    pub fn record_flush(deleted: usize) {
        counter!(format!("{}.flush", METRIC_NAMESPACE)).increment(1);
        counter!(format!("{}.flushed_keys", METRIC_NAMESPACE)).increment(deleted as u64);
    }

    /// 記錄 HTTP 回應快取結果
    pub fn record_http(outcome: &'static str) {
        counter!(format!("{}.http", METRIC_NAMESPACE), "outcome" => outcome).increment(1);
    }
}

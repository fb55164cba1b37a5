//! 多層快取配置
//!
//! `CacheConfig` 在建立 `MultiLevelCache` 時給定，之後不可變更；
//! 需要不同配置時應建立新的快取實例。

use std::time::Duration;

use crate::config::types::CacheSettings;

const MEGABYTE: u64 = 1024 * 1024;

const DEFAULT_LOCAL_SIZE_MB: u64 = 100;
const DEFAULT_LOCAL_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_LOCAL_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_DISTRIBUTED_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// 多層快取配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// 是否啟用本地（進程內）快取層
    pub local_enabled: bool,
    /// 本地快取容量上限（位元組）
    pub local_capacity_bytes: u64,
    /// 本地快取項目存活時間
    pub local_ttl: Duration,
    /// 本地快取過期清理間隔
    pub local_cleanup_interval: Duration,
    /// 是否啟用分散式快取層
    pub distributed_enabled: bool,
    /// 分散式快取項目存活時間
    pub distributed_ttl: Duration,
    /// 鍵前綴，用於在共享的分散式存儲中隔離不同實例
    pub key_prefix: String,
    /// 單次分散式快取操作的超時時間
    pub operation_timeout: Duration,
}

impl CacheConfig {
    /// 生產環境預設值，前綴自動附加 `:`
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            local_enabled: true,
            local_capacity_bytes: DEFAULT_LOCAL_SIZE_MB * MEGABYTE,
            local_ttl: DEFAULT_LOCAL_TTL,
            local_cleanup_interval: DEFAULT_LOCAL_CLEANUP_INTERVAL,
            distributed_enabled: true,
            distributed_ttl: DEFAULT_DISTRIBUTED_TTL,
            key_prefix: format!("{}:", prefix),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// 返回加上實例前綴後的完整鍵
    pub fn full_key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.key_prefix.len() + key.len());
        full.push_str(&self.key_prefix);
        full.push_str(key);
        full
    }

    /// 是否有任一快取層啟用
    pub fn is_enabled(&self) -> bool {
        self.local_enabled || self.distributed_enabled
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            local_enabled: settings.local_enabled,
            local_capacity_bytes: settings.local_size_mb * MEGABYTE,
            local_ttl: Duration::from_secs(settings.local_ttl_secs),
            local_cleanup_interval: Duration::from_secs(settings.local_eviction_secs),
            distributed_enabled: settings.redis_enabled,
            distributed_ttl: Duration::from_secs(settings.redis_ttl_secs),
            key_prefix: format!("{}:", settings.key_prefix),
            operation_timeout: Duration::from_millis(settings.operation_timeout_ms),
        }
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::config::CacheConfig;
use crate::cache::error::{CacheError, StoreError};
use crate::cache::local::MokaLocalStore;
use crate::cache::metrics::{CacheMetrics, MetricType};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::traits::{DistributedStore, LocalStore};

/// 多層級快取（本地 → 分散式 → 回源）
///
/// - 讀取依序檢查本地層與分散式層，分散式命中時回填本地層
/// - 寫入只序列化一次，相同的位元組寫入每個啟用的層
/// - 本地層失敗只記錄日誌；分散式層寫入失敗返回給調用者
/// - 不做請求合併：並發的冷鍵 `get_or_set` 可能各自執行回源函數
///
/// 實例應在啟動時建立一次並以 `Arc` 共享給需要的元件。
pub struct MultiLevelCache {
    config: CacheConfig,
    /// L1: 進程內快取
    local: Option<Arc<dyn LocalStore>>,
    /// L2: 跨進程共享快取
    distributed: Option<Arc<dyn DistributedStore>>,
    stats: StatsRecorder,
}

impl MultiLevelCache {
    /// 創建多層級快取
    ///
    /// 某一層只有在配置啟用且提供了存儲時才會生效。
    pub fn new(
        config: CacheConfig,
        local: Option<Arc<dyn LocalStore>>,
        distributed: Option<Arc<dyn DistributedStore>>,
    ) -> Self {
        let local = local.filter(|_| config.local_enabled);
        let distributed = distributed.filter(|_| config.distributed_enabled);

        info!(
            "多層級快取初始化完成，前綴: '{}'，本地層: {}，分散式層: {}",
            config.key_prefix,
            local.is_some(),
            distributed
                .as_ref()
                .map(|store| store.name())
                .unwrap_or("disabled")
        );

        Self {
            config,
            local,
            distributed,
            stats: StatsRecorder::default(),
        }
    }

    /// 依配置建立 moka 本地層，並接上給定的分散式層
    pub fn from_config(
        config: CacheConfig,
        distributed: Option<Arc<dyn DistributedStore>>,
    ) -> Result<Self, CacheError> {
        let local: Option<Arc<dyn LocalStore>> = if config.local_enabled {
            let store = MokaLocalStore::from_config(&config).map_err(CacheError::LocalError)?;
            Some(Arc::new(store))
        } else {
            None
        };
        Ok(Self::new(config, local, distributed))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    pub fn has_distributed(&self) -> bool {
        self.distributed.is_some()
    }

    /// 從快取獲取值
    ///
    /// 全部未命中時返回 `CacheError::CacheMiss`。分散式層讀取失敗視為該層未命中。
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let start = Instant::now();
        self.stats.record_request();
        let full_key = self.config.full_key(key);

        // 1. 嘗試本地快取
        if let Some(local) = &self.local {
            match local.get(&full_key) {
                Ok(Some(data)) => {
                    self.stats.record_local_hit();
                    CacheMetrics::record(MetricType::Hit { layer: "local" }, None);
                    CacheMetrics::record(
                        MetricType::Latency {
                            operation: "get_local",
                        },
                        Some(start.elapsed()),
                    );
                    debug!("本地快取命中: {}", full_key);
                    return Self::decode(&data);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("本地快取讀取失敗 [{}]: {}", full_key, e);
                    CacheMetrics::record(
                        MetricType::Error {
                            operation: "get",
                            layer: "local",
                        },
                        None,
                    );
                }
            }
            self.stats.record_local_miss();
            CacheMetrics::record(MetricType::Miss { layer: "local" }, None);
        }

        // 2. 嘗試分散式快取
        if let Some(distributed) = &self.distributed {
            match self.with_timeout("get", distributed.get(&full_key)).await {
                Ok(Some(data)) => {
                    self.stats.record_distributed_hit();
                    CacheMetrics::record(MetricType::Hit { layer: "distributed" }, None);
                    CacheMetrics::record(
                        MetricType::Latency {
                            operation: "get_distributed",
                        },
                        Some(start.elapsed()),
                    );
                    debug!("分散式快取命中: {}", full_key);

                    // 回填本地層，失敗不影響讀取
                    if let Some(local) = &self.local {
                        if let Err(e) = local.set(&full_key, data.clone()) {
                            warn!("本地快取回填失敗 [{}]: {}", full_key, e);
                        }
                    }

                    return Self::decode(&data);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("分散式快取讀取失敗，視為未命中 [{}]: {}", full_key, e);
                    CacheMetrics::record(
                        MetricType::Error {
                            operation: "get",
                            layer: "distributed",
                        },
                        None,
                    );
                }
            }
            self.stats.record_distributed_miss();
            CacheMetrics::record(MetricType::Miss { layer: "distributed" }, None);
        }

        debug!("快取未命中: {}", full_key);
        Err(CacheError::CacheMiss(full_key))
    }

    /// 寫入所有啟用的快取層
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.write(key, value, None).await
    }

    /// 以指定 TTL 寫入
    ///
    /// 分散式層使用 `ttl`，本地層使用 `ttl` 與本地 TTL 中較短者。
    pub async fn set_with_ttl<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.write(key, value, Some(ttl)).await
    }

    async fn write<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let start = Instant::now();
        let data = Self::encode(value)?;
        let full_key = self.config.full_key(key);

        if let Some(local) = &self.local {
            let result = match ttl {
                Some(ttl) => {
                    local.set_with_ttl(&full_key, data.clone(), ttl.min(self.config.local_ttl))
                }
                None => local.set(&full_key, data.clone()),
            };
            if let Err(e) = result {
                warn!("本地快取寫入失敗 [{}]: {}", full_key, e);
                CacheMetrics::record(
                    MetricType::Error {
                        operation: "set",
                        layer: "local",
                    },
                    None,
                );
            }
        }

        if let Some(distributed) = &self.distributed {
            let ttl = ttl.unwrap_or(self.config.distributed_ttl);
            if let Err(e) = self
                .with_timeout("set", distributed.set(&full_key, data, ttl))
                .await
            {
                error!("分散式快取寫入失敗 [{}]: {}", full_key, e);
                CacheMetrics::record(
                    MetricType::Error {
                        operation: "set",
                        layer: "distributed",
                    },
                    None,
                );
                return Err(e);
            }
        }

        CacheMetrics::record_set();
        CacheMetrics::record(MetricType::Latency { operation: "set" }, Some(start.elapsed()));
        debug!("快取設置成功: {}", full_key);
        Ok(())
    }

    /// 從所有快取層刪除
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let full_key = self.config.full_key(key);

        if let Some(local) = &self.local {
            if let Err(e) = local.delete(&full_key) {
                warn!("本地快取刪除失敗 [{}]: {}", full_key, e);
            }
        }

        if let Some(distributed) = &self.distributed {
            if let Err(e) = self
                .with_timeout("delete", distributed.delete(&full_key))
                .await
            {
                error!("分散式快取刪除失敗 [{}]: {}", full_key, e);
                CacheMetrics::record(
                    MetricType::Error {
                        operation: "delete",
                        layer: "distributed",
                    },
                    None,
                );
                return Err(e);
            }
        }

        CacheMetrics::record_delete();
        debug!("快取刪除: {}", full_key);
        Ok(())
    }

    /// 從快取獲取值，未命中時執行回源函數並寫入快取
    ///
    /// 回源函數的錯誤原樣返回且不寫入快取；寫入快取失敗只記錄日誌，
    /// 取得的值仍會返回給調用者（序列化錯誤除外）。
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, populate: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Sync,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(value) => return Ok(value),
            Err(CacheError::CacheMiss(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.stats.record_source_hit();
        CacheMetrics::record_source_fetch();
        debug!("快取未命中，執行回源函數: {}", key);

        let value = populate().await?;

        match self.set(key, &value).await {
            Ok(()) => {}
            Err(e) if e.is_serialization() => return Err(e.into()),
            Err(e) => warn!("回源結果寫入快取失敗 [{}]: {}", key, e),
        }

        Ok(value)
    }

    /// 刪除所有匹配模式的鍵，返回分散式層刪除的鍵數
    ///
    /// 刪除逐鍵進行，並非原子操作；並發讀取可能觀察到部分失效的狀態。
    /// 本地層的匹配項目會盡力一併失效。
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let full_pattern = self.config.full_key(pattern);

        if let Some(local) = &self.local {
            if let Err(e) = local.invalidate_matching(&full_pattern) {
                warn!("本地快取模式失效失敗 [{}]: {}", full_pattern, e);
            }
        }

        let deleted = self.delete_matching(&full_pattern).await?;
        CacheMetrics::record_invalidation(deleted);
        info!("快取模式失效 [{}]，刪除 {} 個鍵", full_pattern, deleted);
        Ok(deleted)
    }

    /// 清空本實例前綴下的所有快取
    pub async fn flush(&self) -> Result<usize, CacheError> {
        if let Some(local) = &self.local {
            if let Err(e) = local.reset() {
                warn!("本地快取清空失敗: {}", e);
            }
        }

        let full_pattern = self.config.full_key("*");
        let deleted = self.delete_matching(&full_pattern).await?;
        CacheMetrics::record_flush(deleted);
        info!("快取已清空 [{}]，刪除 {} 個鍵", self.config.key_prefix, deleted);
        Ok(deleted)
    }

    async fn delete_matching(&self, full_pattern: &str) -> Result<usize, CacheError> {
        let Some(distributed) = &self.distributed else {
            return Ok(0);
        };

        let keys = self
            .with_timeout("scan", distributed.scan(full_pattern))
            .await
            .inspect_err(|e| error!("分散式快取掃描失敗 [{}]: {}", full_pattern, e))?;

        let mut deleted = 0;
        for key in keys {
            // 共享存儲中只處理本實例前綴下的鍵
            if !key.starts_with(&self.config.key_prefix) {
                continue;
            }
            self.with_timeout("delete", distributed.delete(&key))
                .await
                .inspect_err(|e| error!("分散式快取刪除失敗 [{}]: {}", key, e))?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// 統計快照
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 整體命中率
    pub fn hit_rate(&self) -> f64 {
        self.stats.snapshot().hit_rate()
    }

    /// 本地層命中率
    pub fn local_hit_rate(&self) -> f64 {
        self.stats.snapshot().local_hit_rate()
    }

    /// 釋放本地層資源；分散式層的生命週期由其擁有者管理
    pub fn close(&self) -> Result<(), CacheError> {
        if let Some(local) = &self.local {
            local.close().map_err(CacheError::LocalError)?;
        }
        Ok(())
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout = self.config.operation_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(CacheError::DistributedError),
            Err(_) => Err(CacheError::Timeout { operation, timeout }),
        }
    }

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::SerializationError(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(data).map_err(|e| CacheError::DeserializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::cache::traits::MockDistributedStore;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn test_config() -> CacheConfig {
        CacheConfig {
            operation_timeout: Duration::from_millis(100),
            ..CacheConfig::with_prefix("test")
        }
    }

    fn local_store() -> Arc<dyn LocalStore> {
        Arc::new(
            MokaLocalStore::new(1024 * 1024, Duration::from_secs(60), Duration::ZERO).unwrap(),
        )
    }

    /// 永遠失敗的本地存儲
    struct BrokenLocalStore;

    impl LocalStore for BrokenLocalStore {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::Other("broken".to_string()))
        }

        fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Other("broken".to_string()))
        }

        fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Other("broken".to_string()))
        }

        fn reset(&self) -> Result<(), StoreError> {
            Err(StoreError::Other("broken".to_string()))
        }

        fn close(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// 每次操作都比超時時間慢的分散式存儲
    struct SlowStore;

    #[async_trait]
    impl DistributedStore for SlowStore {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn scan(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_set_get_both_tiers() {
        let distributed = Arc::new(MemoryStore::new());
        let cache = MultiLevelCache::new(
            test_config(),
            Some(local_store()),
            Some(distributed.clone()),
        );

        cache.set("gpu:1", &vec![1, 2, 3]).await.unwrap();
        assert!(distributed.contains_key("test:gpu:1"));

        let value: Vec<i32> = cache.get("gpu:1").await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        let stats = cache.stats();
        assert_eq!(stats.local_hits, 1);
        assert_eq!(stats.total_requests, 1);
    }

    #[tokio::test]
    async fn test_get_without_tiers_is_miss() {
        let mut config = test_config();
        config.local_enabled = false;
        config.distributed_enabled = false;
        let cache = MultiLevelCache::new(config, Some(local_store()), None);

        assert!(!cache.has_local());
        let result = cache.get::<String>("missing").await;
        assert_matches!(result, Err(CacheError::CacheMiss(key)) if key == "test:missing");
    }

    #[tokio::test]
    async fn test_decode_error_is_not_a_miss() {
        let cache = MultiLevelCache::new(test_config(), Some(local_store()), None);
        cache.set("name", "not a number").await.unwrap();

        let result = cache.get::<u64>("name").await;
        assert_matches!(result, Err(CacheError::DeserializationError(_)));
    }

    #[tokio::test]
    async fn test_serialization_error_is_returned() {
        let cache = MultiLevelCache::new(test_config(), Some(local_store()), None);
        let mut value = HashMap::new();
        value.insert((1, 2), 3);

        let result = cache.set("bad", &value).await;
        assert_matches!(result, Err(CacheError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_local_failures_are_swallowed() {
        let distributed = Arc::new(MemoryStore::new());
        let cache = MultiLevelCache::new(
            test_config(),
            Some(Arc::new(BrokenLocalStore)),
            Some(distributed.clone()),
        );

        cache.set("k", &42).await.unwrap();
        let value: i32 = cache.get("k").await.unwrap();
        assert_eq!(value, 42);

        let stats = cache.stats();
        assert_eq!(stats.local_misses, 1);
        assert_eq!(stats.distributed_hits, 1);

        cache.delete("k").await.unwrap();
        assert!(!distributed.contains_key("test:k"));
    }

    #[tokio::test]
    async fn test_distributed_set_failure_is_returned() {
        let mut mock = MockDistributedStore::new();
        mock.expect_name().return_const("mock");
        mock.expect_set()
            .returning(|_, _, _| Err(StoreError::Unavailable("down".to_string())));

        let cache = MultiLevelCache::new(test_config(), Some(local_store()), Some(Arc::new(mock)));

        let result = cache.set("k", &1).await;
        assert_matches!(result, Err(CacheError::DistributedError(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_distributed_delete_failure_is_returned() {
        let mut mock = MockDistributedStore::new();
        mock.expect_name().return_const("mock");
        mock.expect_delete()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));

        let cache = MultiLevelCache::new(test_config(), None, Some(Arc::new(mock)));
        assert_matches!(cache.delete("k").await, Err(CacheError::DistributedError(_)));
    }

    #[tokio::test]
    async fn test_distributed_read_failure_is_a_miss() {
        let mut mock = MockDistributedStore::new();
        mock.expect_name().return_const("mock");
        mock.expect_get()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));

        let cache = MultiLevelCache::new(test_config(), None, Some(Arc::new(mock)));
        let result = cache.get::<i32>("k").await;
        assert_matches!(result, Err(CacheError::CacheMiss(_)));
        assert_eq!(cache.stats().distributed_misses, 1);
    }

    #[tokio::test]
    async fn test_get_or_set_keeps_value_when_cache_write_fails() {
        let mut mock = MockDistributedStore::new();
        mock.expect_name().return_const("mock");
        mock.expect_get().returning(|_| Ok(None));
        mock.expect_set()
            .returning(|_, _, _| Err(StoreError::Unavailable("down".to_string())));

        let cache = MultiLevelCache::new(test_config(), None, Some(Arc::new(mock)));
        let value: String = cache
            .get_or_set("k", || async { Ok::<_, CacheError>("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
        assert_eq!(cache.stats().source_hits, 1);
    }

    #[tokio::test]
    async fn test_get_or_set_propagates_serialization_error() {
        let cache = MultiLevelCache::new(test_config(), Some(local_store()), None);
        let result: Result<HashMap<(i32, i32), i32>, CacheError> = cache
            .get_or_set("bad", || async {
                let mut value = HashMap::new();
                value.insert((1, 2), 3);
                Ok(value)
            })
            .await;
        assert_matches!(result, Err(CacheError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_distributed_operations_time_out() {
        let cache = MultiLevelCache::new(test_config(), None, Some(Arc::new(SlowStore)));

        // 讀取超時視為未命中
        let started = Instant::now();
        assert_matches!(cache.get::<i32>("k").await, Err(CacheError::CacheMiss(_)));
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_matches!(
            cache.set("k", &1).await,
            Err(CacheError::Timeout { operation: "set", .. })
        );
        assert_matches!(
            cache.invalidate_pattern("*").await,
            Err(CacheError::Timeout { operation: "scan", .. })
        );
    }

    #[tokio::test]
    async fn test_invalidate_pattern_never_leaves_prefix() {
        let mut mock = MockDistributedStore::new();
        mock.expect_name().return_const("mock");
        mock.expect_scan()
            .withf(|pattern| pattern == "test:gpu:*")
            .returning(|_| Ok(vec!["test:gpu:1".to_string(), "other:gpu:1".to_string()]));
        mock.expect_delete()
            .withf(|key| key == "test:gpu:1")
            .times(1)
            .returning(|_| Ok(()));

        let cache = MultiLevelCache::new(test_config(), None, Some(Arc::new(mock)));
        assert_eq!(cache.invalidate_pattern("gpu:*").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flush_only_touches_own_prefix() {
        let distributed = Arc::new(MemoryStore::new());
        let ttl = Duration::from_secs(60);
        distributed
            .set("other:k", b"1".to_vec(), ttl)
            .await
            .unwrap();

        let cache = MultiLevelCache::new(
            test_config(),
            Some(local_store()),
            Some(distributed.clone()),
        );
        cache.set("a", &1).await.unwrap();
        cache.set("b", &2).await.unwrap();

        assert_eq!(cache.flush().await.unwrap(), 2);
        assert!(distributed.contains_key("other:k"));
        assert_matches!(cache.get::<i32>("a").await, Err(CacheError::CacheMiss(_)));
    }

    #[tokio::test]
    async fn test_close_releases_local_tier() {
        let cache = MultiLevelCache::from_config(test_config(), None).unwrap();
        cache.set("k", &1).await.unwrap();
        cache.close().unwrap();

        // 關閉後本地層不可用，讀取退化為未命中
        assert_matches!(cache.get::<i32>("k").await, Err(CacheError::CacheMiss(_)));
    }
}

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gpu_proxy::cache::{
    CacheConfig, DistributedStore, LocalStore, MemoryStore, MokaLocalStore, MultiLevelCache,
    StoreError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuOffer {
    pub id: String,
    pub provider: String,
    pub gpu: String,
    pub hourly_price: f64,
}

pub fn offer(id: &str) -> GpuOffer {
    GpuOffer {
        id: id.to_string(),
        provider: "vastai".to_string(),
        gpu: "A100".to_string(),
        hourly_price: 1.25,
    }
}

pub fn test_config(prefix: &str) -> CacheConfig {
    CacheConfig {
        local_capacity_bytes: 4 * 1024 * 1024,
        local_cleanup_interval: Duration::ZERO,
        operation_timeout: Duration::from_millis(500),
        ..CacheConfig::with_prefix(prefix)
    }
}

pub fn local_store(config: &CacheConfig) -> Arc<dyn LocalStore> {
    Arc::new(MokaLocalStore::from_config(config).expect("local store"))
}

/// 本地層 + 記憶體分散式層
pub fn two_tier_cache(prefix: &str) -> (MultiLevelCache, Arc<MemoryStore>) {
    let config = test_config(prefix);
    let distributed = Arc::new(MemoryStore::new());
    let cache = MultiLevelCache::new(
        config.clone(),
        Some(local_store(&config)),
        Some(distributed.clone()),
    );
    (cache, distributed)
}

/// 可以在測試中切換為不可用的分散式存儲
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("flaky store is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributedStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        self.inner.scan(pattern).await
    }
}

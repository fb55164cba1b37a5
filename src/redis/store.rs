//! Redis 分散式快取層
//!
//! 模式刪除只使用遊標式 `SCAN MATCH`，不使用會阻塞伺服器的 `KEYS`。

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::cmd;
use tracing::debug;

use crate::cache::error::StoreError;
use crate::cache::traits::DistributedStore;
use crate::redis::pool::RedisPool;

/// SCAN 預設每批的建議鍵數
pub const DEFAULT_SCAN_COUNT: u32 = 100;

/// 基於 Redis 連接池的分散式存儲
pub struct RedisStore<P: RedisPool> {
    pool: P,
    scan_count: u32,
}

impl<P: RedisPool> RedisStore<P> {
    pub fn new(pool: P) -> Self {
        Self::with_scan_count(pool, DEFAULT_SCAN_COUNT)
    }

    pub fn with_scan_count(pool: P, scan_count: u32) -> Self {
        Self {
            pool,
            scan_count: scan_count.max(1),
        }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }
}

#[async_trait]
impl<P: RedisPool> DistributedStore for RedisStore<P> {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.pool.get_conn().await?;
        let value: Option<Vec<u8>> = cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.pool.get_conn().await?;
        // PX 必須為正數
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get_conn().await?;
        cmd("DEL").arg(key).query_async::<i64>(&mut conn).await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get_conn().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN 在重新雜湊期間可能重複返回同一個鍵
        keys.sort_unstable();
        keys.dedup();
        debug!("Redis SCAN [{}] 找到 {} 個鍵", pattern, keys.len());
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::pool::ConnectionPool;
    use crate::redis::test_config::RedisTestConfig;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unreachable_redis_returns_error() {
        let mut config = RedisTestConfig::create_test_config();
        config.url = "redis://127.0.0.1:1".to_string();
        config.connection_timeout_secs = 1;
        let store = RedisStore::new(Arc::new(ConnectionPool::new(&config).unwrap()));

        assert_matches!(store.get("gpu:k").await, Err(StoreError::Pool(_)));
    }

    #[tokio::test]
    #[ignore = "requires running Redis instance"]
    async fn test_get_set_delete() {
        let store = RedisStore::new(RedisTestConfig::create_test_pool().unwrap());
        let key = "gpu_proxy_test:store:roundtrip";

        store
            .set(key, b"value".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.get(key).await.unwrap(), Some(b"value".to_vec()));

        store.delete(key).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires running Redis instance"]
    async fn test_ttl_expires() {
        let store = RedisStore::new(RedisTestConfig::create_test_pool().unwrap());
        let key = "gpu_proxy_test:store:ttl";

        store
            .set(key, b"value".to_vec(), Duration::from_millis(100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires running Redis instance"]
    async fn test_scan_visits_every_batch() {
        let store = RedisStore::with_scan_count(RedisTestConfig::create_test_pool().unwrap(), 2);
        let ttl = Duration::from_secs(30);

        for i in 0..10 {
            store
                .set(&format!("gpu_proxy_test:scan:{}", i), b"x".to_vec(), ttl)
                .await
                .unwrap();
        }
        store
            .set("gpu_proxy_test_other:scan:0", b"x".to_vec(), ttl)
            .await
            .unwrap();

        let keys = store.scan("gpu_proxy_test:scan:*").await.unwrap();
        assert_eq!(keys.len(), 10);

        for key in keys {
            store.delete(&key).await.unwrap();
        }
        store.delete("gpu_proxy_test_other:scan:0").await.unwrap();
    }
}

//! Redis 測試環境配置
//!
//! 依賴真實 Redis 的測試以 `#[ignore]` 標記，執行 `cargo test -- --ignored` 時使用這裡的配置。

use crate::config::types::RedisConfig;
use crate::redis::pool::{ConnectionPool, RedisPoolError};
use std::sync::Arc;

/// Redis 測試配置建構器
pub struct RedisTestConfig;

impl RedisTestConfig {
    /// 獲取測試用 Redis URL
    ///
    /// 優先使用 `REDIS_TEST_URL`，在容器內使用 `redis:6379`，否則使用本機。
    pub fn get_test_url() -> String {
        if let Ok(url) = std::env::var("REDIS_TEST_URL") {
            return url;
        }

        if Self::is_docker_environment() {
            "redis://redis:6379".to_string()
        } else {
            "redis://localhost:6379".to_string()
        }
    }

    fn is_docker_environment() -> bool {
        std::env::var("DOCKER_CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists()
    }

    /// 建立標準測試 Redis 配置
    pub fn create_test_config() -> RedisConfig {
        RedisConfig {
            url: Self::get_test_url(),
            pool_size: 3,
            connection_timeout_secs: 5,
            scan_count: 100,
        }
    }

    /// 建立測試用 Redis 連接池
    pub fn create_test_pool() -> Result<Arc<ConnectionPool>, RedisPoolError> {
        let config = Self::create_test_config();
        Ok(Arc::new(ConnectionPool::new(&config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_test_url_with_env_var() {
        std::env::set_var("REDIS_TEST_URL", "redis://custom:1234");
        let url = RedisTestConfig::get_test_url();
        std::env::remove_var("REDIS_TEST_URL");

        assert_eq!(url, "redis://custom:1234");
    }

    #[test]
    #[serial]
    fn test_create_test_config() {
        let config = RedisTestConfig::create_test_config();
        assert!(config.url.starts_with("redis://"));
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.scan_count, 100);
    }
}

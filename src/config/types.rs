use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::validation::{ValidationError, ValidationUtils, Validator};

/// 鍵前綴中不允許出現的 glob 元字元
const GLOB_METACHARACTERS: &[char] = &['*', '?', '[', ']', '\\'];

/// 應用程序配置結構
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub log: LogConfig,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub cache: CacheSettings,
    pub http_cache: HttpCacheSettings,
}

impl Validator for ApplicationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證各個部分的配置
        self.log.validate()?;
        self.server.validate()?;
        self.redis.validate()?;
        self.cache.validate()?;
        self.http_cache.validate()?;

        // HTTP 回應快取建立在多層快取之上
        ValidationUtils::check_dependency(
            self.http_cache.enabled,
            self.cache.local_enabled || self.cache.redis_enabled,
            "http_cache.enabled",
            "cache.local_enabled / cache.redis_enabled",
        )?;

        Ok(())
    }
}

/// 日誌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Validator for LogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證日誌級別
        ValidationUtils::one_of(
            &self.level.to_lowercase(),
            &["trace", "debug", "info", "warn", "error"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
            "log.level",
        )?;

        // 驗證日誌格式
        ValidationUtils::one_of(
            &self.format.to_lowercase(),
            &["pretty", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
            "log.format",
        )?;

        Ok(())
    }
}

/// 伺服器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Validator for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::not_empty(&self.host, "server.host")?;
        ValidationUtils::in_range(self.port, 1, 65535, "server.port")?;
        ValidationUtils::in_range(self.request_timeout_secs, 1, 600, "server.request_timeout_secs")?;

        Ok(())
    }
}

impl ServerConfig {
    /// 監聽地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
    pub connection_timeout_secs: u64,
    /// SCAN 每批建議返回的鍵數
    pub scan_count: u32,
}

impl Validator for RedisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證Redis配置
        ValidationUtils::not_empty(&self.url, "redis.url")?;
        ValidationUtils::in_range(self.pool_size, 1, 100, "redis.pool_size")?;
        ValidationUtils::in_range(self.connection_timeout_secs, 1, 60, "redis.connection_timeout_secs")?;
        ValidationUtils::in_range(self.scan_count, 1, 10_000, "redis.scan_count")?;

        Ok(())
    }
}

/// 多層快取配置（文件中以秒、MB 為單位）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub local_enabled: bool,
    pub local_size_mb: u64,
    pub local_ttl_secs: u64,
    pub local_eviction_secs: u64,
    pub redis_enabled: bool,
    pub redis_ttl_secs: u64,
    /// 實例鍵前綴，不含結尾的 `:`
    pub key_prefix: String,
    pub operation_timeout_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_size_mb: 100,
            local_ttl_secs: 300,
            local_eviction_secs: 60,
            redis_enabled: true,
            redis_ttl_secs: 1800,
            key_prefix: "gpu_proxy".to_string(),
            operation_timeout_ms: 2000,
        }
    }
}

impl Validator for CacheSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::not_empty(&self.key_prefix, "cache.key_prefix")?;
        ValidationUtils::without_chars(&self.key_prefix, GLOB_METACHARACTERS, "cache.key_prefix")?;

        if self.local_enabled {
            ValidationUtils::in_range(self.local_size_mb, 1, 65_536, "cache.local_size_mb")?;
            ValidationUtils::in_range(self.local_ttl_secs, 1, 86_400, "cache.local_ttl_secs")?;
            ValidationUtils::in_range(self.local_eviction_secs, 0, 3600, "cache.local_eviction_secs")?;
        }

        if self.redis_enabled {
            ValidationUtils::in_range(self.redis_ttl_secs, 1, 30 * 86_400, "cache.redis_ttl_secs")?;
        }

        ValidationUtils::in_range(self.operation_timeout_ms, 1, 60_000, "cache.operation_timeout_ms")?;

        Ok(())
    }
}

/// HTTP 回應快取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// 鍵生成策略：`default`、`hash` 或 `user`
    pub key_strategy: String,
    /// `user` 策略下讀取用戶識別的請求標頭
    pub user_id_header: String,
}

impl Validator for HttpCacheSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }

        ValidationUtils::in_range(self.ttl_secs, 1, 86_400, "http_cache.ttl_secs")?;
        ValidationUtils::one_of(
            &self.key_strategy.to_lowercase(),
            &["default", "hash", "user"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
            "http_cache.key_strategy",
        )?;
        if self.key_strategy.eq_ignore_ascii_case("user") {
            ValidationUtils::not_empty(&self.user_id_header, "http_cache.user_id_header")?;
        }

        Ok(())
    }
}

impl HttpCacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

use std::time::Duration;

use thiserror::Error;

use crate::redis::pool::RedisPoolError;

/// 快取層（本地 / 分散式）存儲錯誤
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis連接池錯誤
    #[error("Redis連接池錯誤: {0}")]
    Pool(#[from] RedisPoolError),

    /// Redis命令錯誤
    #[error("Redis命令錯誤: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    /// 無效的匹配模式
    #[error("無效的匹配模式 '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// 存儲已關閉或不可用
    #[error("快取存儲不可用: {0}")]
    Unavailable(String),

    /// 其他錯誤
    #[error("快取存儲其他錯誤: {0}")]
    Other(String),
}

/// 多層快取操作錯誤
///
/// `CacheMiss` 是預期中的結果而非故障，調用者應據此回源；
/// 其餘變體代表真正的錯誤。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 所有啟用的快取層皆未命中
    #[error("快取未命中: {0}")]
    CacheMiss(String),

    /// 序列化錯誤
    #[error("數據序列化錯誤: {0}")]
    SerializationError(String),

    /// 反序列化錯誤
    #[error("數據反序列化錯誤: {0}")]
    DeserializationError(String),

    /// 本地快取層錯誤
    #[error("本地快取層錯誤: {0}")]
    LocalError(#[source] StoreError),

    /// 分散式快取層錯誤
    #[error("分散式快取層錯誤: {0}")]
    DistributedError(#[source] StoreError),

    /// 分散式快取操作超時
    #[error("分散式快取操作 {operation} 超時 ({timeout:?})")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl CacheError {
    /// 是否為快取未命中
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::CacheMiss(_))
    }

    /// 是否為序列化 / 反序列化錯誤
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            CacheError::SerializationError(_) | CacheError::DeserializationError(_)
        )
    }
}

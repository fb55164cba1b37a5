use crate::config::types::RedisConfig;
use async_trait::async_trait;
use deadpool::managed::QueueMode;
use deadpool_redis::{
    redis::{cmd, RedisError},
    Config, Connection, CreatePoolError, Pool, PoolConfig, PoolError, Runtime, Timeouts,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// 閒置連接在回收前允許的最長檢查時間
const RECYCLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Redis 連接池錯誤
#[derive(Error, Debug)]
pub enum RedisPoolError {
    #[error("Redis連接池初始化失敗: {0}")]
    Init(#[from] CreatePoolError),

    /// 等待或建立連接逾時，或 Redis 拒絕連接
    #[error("無法取得Redis連接: {0}")]
    Checkout(#[from] PoolError),

    #[error("Redis命令失敗: {0}")]
    Command(#[from] RedisError),

    #[error("Redis PING 回應異常: {0}")]
    UnexpectedPong(String),
}

/// 分散式快取層所需的連接來源
#[async_trait]
pub trait RedisPool: Send + Sync + 'static {
    async fn get_conn(&self) -> Result<Connection, RedisPoolError>;

    /// 發送 `PING` 並返回往返時間
    async fn ping(&self) -> Result<Duration, RedisPoolError> {
        let started = Instant::now();
        let mut conn = self.get_conn().await?;
        let pong: String = cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(RedisPoolError::UnexpectedPong(pong));
        }
        Ok(started.elapsed())
    }
}

#[async_trait]
impl<P: RedisPool> RedisPool for Arc<P> {
    async fn get_conn(&self) -> Result<Connection, RedisPoolError> {
        P::get_conn(self).await
    }

    async fn ping(&self) -> Result<Duration, RedisPoolError> {
        P::ping(self).await
    }
}

/// deadpool-redis 連接池
///
/// 連接是惰性建立的，創建成功不代表 Redis 可達；需要時以 `ping` 確認。
pub struct ConnectionPool {
    pool: Pool,
}

impl ConnectionPool {
    pub fn new(config: &RedisConfig) -> Result<Self, RedisPoolError> {
        let connect_timeout = Duration::from_secs(config.connection_timeout_secs);
        let mut cfg = Config::from_url(&config.url);
        cfg.pool = Some(PoolConfig {
            max_size: config.pool_size as usize,
            timeouts: Timeouts {
                wait: Some(connect_timeout),
                create: Some(connect_timeout),
                recycle: Some(RECYCLE_TIMEOUT),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        debug!("Redis連接池已建立，上限 {} 個連接", config.pool_size);
        Ok(Self { pool })
    }

    /// 目前持有與閒置的連接數
    pub fn connections(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.size, status.available)
    }
}

#[async_trait]
impl RedisPool for ConnectionPool {
    async fn get_conn(&self) -> Result<Connection, RedisPoolError> {
        self.pool.get().await.map_err(|e| {
            warn!("無法從Redis連接池取得連接: {}", e);
            RedisPoolError::from(e)
        })
    }
}

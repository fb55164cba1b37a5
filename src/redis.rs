//! Redis存儲模組
//!
//! 提供連接池管理與多層快取的 Redis 分散式層實現。

pub mod pool;
pub mod store;

#[cfg(test)]
pub mod test_config;

pub use pool::{ConnectionPool, RedisPool, RedisPoolError};
pub use store::RedisStore;

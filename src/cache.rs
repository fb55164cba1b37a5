pub mod combinators;
pub mod config;
pub mod error;
pub mod keys;
pub mod local;
pub mod memory;
pub mod metrics;
pub mod middleware;
pub mod multi_level;
pub mod pattern;
pub mod stats;
pub mod traits;

// Re-export commonly used types
pub use combinators::{cacheable_list, cacheable_query, invalidate_on_write};
pub use config::CacheConfig;
pub use error::{CacheError, StoreError};
pub use keys::CacheKeyGen;
pub use local::MokaLocalStore;
pub use memory::MemoryStore;
pub use metrics::{CacheMetrics, MetricType, METRIC_NAMESPACE};
pub use middleware::{
    default_key_builder, hash_key_builder, invalidate_handler, response_cache_layer,
    user_aware_key_builder, CachedHeader, CachedHttpResponse, HttpCache, KeyBuilder,
};
pub use multi_level::MultiLevelCache;
pub use stats::{CacheStats, StatsRecorder};
pub use traits::{DistributedStore, LocalStore};

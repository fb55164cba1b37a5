use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 快取命中統計快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// 本地層命中次數
    pub local_hits: u64,
    /// 本地層未命中次數
    pub local_misses: u64,
    /// 分散式層命中次數
    pub distributed_hits: u64,
    /// 分散式層未命中次數
    pub distributed_misses: u64,
    /// 完全未命中並執行回源函數的次數
    pub source_hits: u64,
    /// `get` / `get_or_set` 請求總數
    pub total_requests: u64,
}

impl CacheStats {
    /// 整體命中率，無請求時為 0
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.local_hits + self.distributed_hits) as f64 / self.total_requests as f64
    }

    /// 本地層命中率，無請求時為 0
    pub fn local_hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.local_hits as f64 / self.total_requests as f64
    }
}

/// 無鎖的統計計數器，供並發請求共同更新
#[derive(Debug, Default)]
pub struct StatsRecorder {
    local_hits: AtomicU64,
    local_misses: AtomicU64,
    distributed_hits: AtomicU64,
    distributed_misses: AtomicU64,
    source_hits: AtomicU64,
    total_requests: AtomicU64,
}

impl StatsRecorder {
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_miss(&self) {
        self.local_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_distributed_hit(&self) {
        self.distributed_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_distributed_miss(&self) {
        self.distributed_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_hit(&self) {
        self.source_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// 讀取當前計數快照（不重置）
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            local_misses: self.local_misses.load(Ordering::Relaxed),
            distributed_hits: self.distributed_hits.load(Ordering::Relaxed),
            distributed_misses: self.distributed_misses.load(Ordering::Relaxed),
            source_hits: self.source_hits.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
        }
    }
}

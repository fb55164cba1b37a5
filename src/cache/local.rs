//! 基於 moka 的本地快取層
//!
//! 以位元組數作為權重限制容量，逐項記錄 TTL，並啟用謂詞失效以支援模式刪除。
//! 背景清理執行緒按配置的間隔觸發 moka 的維護任務。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use moka::sync::Cache;
use moka::Expiry;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::config::CacheConfig;
use crate::cache::error::StoreError;
use crate::cache::pattern::compile as compile_pattern;
use crate::cache::traits::LocalStore;

#[derive(Clone)]
struct LocalEntry {
    value: Arc<Vec<u8>>,
    ttl: Duration,
}

/// 每個項目按自身記錄的 TTL 過期
struct EntryExpiry;

impl Expiry<String, LocalEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

struct CleanupWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// moka 本地快取存儲
pub struct MokaLocalStore {
    cache: Cache<String, LocalEntry>,
    default_ttl: Duration,
    closed: AtomicBool,
    worker: Mutex<Option<CleanupWorker>>,
}

impl MokaLocalStore {
    /// 創建本地快取存儲
    ///
    /// # Arguments
    /// * `capacity_bytes` - 鍵與值位元組總量上限
    /// * `ttl` - 預設項目存活時間
    /// * `cleanup_interval` - 背景清理間隔，為零時不啟動清理執行緒
    pub fn new(
        capacity_bytes: u64,
        ttl: Duration,
        cleanup_interval: Duration,
    ) -> Result<Self, StoreError> {
        let cache = Cache::builder()
            .max_capacity(capacity_bytes)
            .weigher(|key: &String, entry: &LocalEntry| -> u32 {
                (key.len() + entry.value.len())
                    .try_into()
                    .unwrap_or(u32::MAX)
            })
            .expire_after(EntryExpiry)
            .support_invalidation_closures()
            .build();

        let worker = if cleanup_interval.is_zero() {
            None
        } else {
            Some(Self::spawn_cleanup_worker(cache.clone(), cleanup_interval)?)
        };

        info!(
            "本地快取初始化完成，容量: {} 位元組，TTL: {:?}",
            capacity_bytes, ttl
        );

        Ok(Self {
            cache,
            default_ttl: ttl,
            closed: AtomicBool::new(false),
            worker: Mutex::new(worker),
        })
    }

    /// 依快取配置創建
    pub fn from_config(config: &CacheConfig) -> Result<Self, StoreError> {
        Self::new(
            config.local_capacity_bytes,
            config.local_ttl,
            config.local_cleanup_interval,
        )
    }

    /// 目前的項目數（近似值）
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// 目前佔用的權重（位元組）
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    fn spawn_cleanup_worker(
        cache: Cache<String, LocalEntry>,
        interval: Duration,
    ) -> Result<CleanupWorker, StoreError> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = std::thread::Builder::new()
            .name("local-cache-cleanup".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => cache.run_pending_tasks(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| StoreError::Other(format!("無法啟動本地快取清理執行緒: {}", e)))?;

        Ok(CleanupWorker { stop_tx, handle })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("本地快取已關閉".to_string()));
        }
        Ok(())
    }

    fn stop_worker(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                warn!("本地快取清理執行緒異常結束");
            }
        }
    }
}

impl LocalStore for MokaLocalStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        Ok(self.cache.get(key).map(|entry| entry.value.as_ref().clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.cache.insert(
            key.to_string(),
            LocalEntry {
                value: Arc::new(value),
                ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.cache.invalidate(key);
        Ok(())
    }

    fn invalidate_matching(&self, pattern: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let matcher = compile_pattern(pattern)?;

        self.cache
            .invalidate_entries_if(move |key, _| matcher.matches(key))
            .map_err(|e| StoreError::Other(e.to_string()))?;

        debug!("本地快取模式失效: {}", pattern);
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.cache.invalidate_all();
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stop_worker();
        self.cache.invalidate_all();
        info!("本地快取已關閉");
        Ok(())
    }
}

impl Drop for MokaLocalStore {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

//! 快取鍵構建
//!
//! 所有方法都是純函數，不做任何 I/O；相同輸入必定產生相同的鍵。

use std::time::Duration;

use chrono::{DateTime, Utc};

/// 快取鍵生成器，按類別組裝 `<prefix>:<category>:<segments>` 形式的鍵
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyGen {
    prefix: String,
}

impl CacheKeyGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 單一資源的鍵
    pub fn resource(&self, resource_type: &str, resource_id: &str) -> String {
        format!("{}:resource:{}:{}", self.prefix, resource_type, resource_id)
    }

    /// 列表的鍵
    ///
    /// 過濾條件按傳入順序拼接，順序不同即為不同的鍵；
    /// 需要與順序無關時調用者應先排序。
    pub fn list<S: AsRef<str>>(&self, resource_type: &str, filters: &[S]) -> String {
        if filters.is_empty() {
            return format!("{}:list:{}", self.prefix, resource_type);
        }
        let joined = filters
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(":");
        format!("{}:list:{}:{}", self.prefix, resource_type, joined)
    }

    /// 用戶範圍的鍵
    pub fn user(&self, user_id: &str, resource: &str) -> String {
        format!("{}:user:{}:{}", self.prefix, user_id, resource)
    }

    /// 帶參數查詢的鍵，參數按名稱排序以保證穩定
    pub fn query<I, K, V>(&self, query_name: &str, params: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut parts: Vec<String> = params
            .into_iter()
            .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
            .collect();
        parts.sort();
        format!("{}:query:{}:{}", self.prefix, query_name, parts.join("&"))
    }

    /// 以當前時間桶為識別的鍵
    pub fn timestamped(&self, resource: &str, bucket: Duration) -> String {
        self.timestamped_at(resource, bucket, Utc::now())
    }

    /// 以指定時間所在的時間桶為識別的鍵
    ///
    /// 鍵的解析度為一秒：時間戳（Unix 秒）向下截斷到 `bucket` 的整數秒倍數，
    /// 不足一秒的部分忽略，因此 `bucket` 小於一秒時等同不截斷。
    /// 超出 `i64` 範圍的 `bucket` 視為單一時間桶。
    pub fn timestamped_at(&self, resource: &str, bucket: Duration, now: DateTime<Utc>) -> String {
        let bucket_secs = i64::try_from(bucket.as_secs()).unwrap_or(i64::MAX);
        let now_secs = now.timestamp();
        let truncated = if bucket_secs > 0 {
            now_secs - now_secs.rem_euclid(bucket_secs)
        } else {
            now_secs
        };
        format!("{}:ts:{}:{}", self.prefix, resource, truncated)
    }
}

//! 建立在 `MultiLevelCache` 公開接口之上的通用快取模式

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::error::CacheError;
use crate::cache::multi_level::MultiLevelCache;

/// 快取單一查詢結果
pub async fn cacheable_query<T, E, F, Fut>(
    cache: &MultiLevelCache,
    key: &str,
    query_fn: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned + Sync,
    E: From<CacheError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    cache.get_or_set(key, query_fn).await
}

/// 快取列表查詢結果，並在回源時把每個項目單獨寫入快取
///
/// 單個項目寫入失敗只記錄日誌，不影響列表結果。
pub async fn cacheable_list<T, E, K, F, Fut>(
    cache: &MultiLevelCache,
    list_key: &str,
    item_key_fn: K,
    query_fn: F,
) -> Result<Vec<T>, E>
where
    T: Serialize + DeserializeOwned + Sync,
    E: From<CacheError>,
    K: Fn(&T) -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    cache
        .get_or_set(list_key, || async {
            let items = query_fn().await?;
            for item in &items {
                let item_key = item_key_fn(item);
                if let Err(e) = cache.set(&item_key, item).await {
                    warn!("列表項目寫入快取失敗 [{}]: {}", item_key, e);
                }
            }
            debug!("列表 {} 回源完成，共 {} 項", list_key, items.len());
            Ok::<_, E>(items)
        })
        .await
}

/// 先執行寫入，成功後再失效相關的快取模式
///
/// 寫入失敗時不做任何失效並原樣返回錯誤。寫入已提交後的失效失敗只記錄日誌，
/// 受影響的項目在其 TTL 內仍可能被讀到。
pub async fn invalidate_on_write<T, E, F, Fut, P>(
    cache: &MultiLevelCache,
    patterns: &[P],
    write_fn: F,
) -> Result<T, E>
where
    P: AsRef<str>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let output = write_fn().await?;

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if let Err(e) = cache.invalidate_pattern(pattern).await {
            warn!("寫入後快取失效失敗 [{}]: {}", pattern, e);
        }
    }

    Ok(output)
}

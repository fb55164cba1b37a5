use std::time::Duration;

use async_trait::async_trait;

use crate::cache::error::StoreError;

/// 本地（進程內）快取層能力接口
///
/// 本地層不涉及網絡 I/O，因此所有方法皆為同步調用。
/// 過期與驅逐由存儲自身按建立時的配置處理。
pub trait LocalStore: Send + Sync {
    /// 讀取鍵對應的位元組；不存在或已過期時返回 `None`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// 以存儲預設的 TTL 寫入
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// 以指定 TTL 寫入；不支援逐項 TTL 的存儲退回 `set`
    fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let _ = ttl;
        self.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 失效所有匹配模式的鍵，語法同 Redis `MATCH`（見 [`crate::cache::pattern`]）；
    /// 不支援模式匹配的存儲為空操作
    fn invalidate_matching(&self, pattern: &str) -> Result<(), StoreError> {
        let _ = pattern;
        Ok(())
    }

    /// 清空整個存儲
    fn reset(&self) -> Result<(), StoreError>;

    /// 釋放存儲資源（背景清理工作等）
    fn close(&self) -> Result<(), StoreError>;
}

/// 分散式（跨進程共享）快取層能力接口
///
/// 所有方法都可能涉及網絡 I/O；調用者透過丟棄 future 或外層超時取消操作。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// 用於日誌與監控的名稱
    fn name(&self) -> &'static str;

    /// 讀取鍵；不存在時返回 `Ok(None)`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// 寫入並設置過期時間
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 列出所有匹配模式的鍵
    ///
    /// 模式語法同 Redis `MATCH`：`*`、`?`、`[abc]`、`[a-z]`、`[^abc]` 和 `\` 轉義。
    /// 進程內實現經 [`crate::cache::pattern::compile`] 轉換後匹配，
    /// 未閉合的 `[` 與空集合 `[]` 會被拒絕。
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}

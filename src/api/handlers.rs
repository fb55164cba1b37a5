/// 快取管理處理器
pub mod cache;
/// 系統處理器
pub mod system;

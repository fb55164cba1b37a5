// api.rs - API服務模組，宣告子模組
//
// 提供快取服務的 HTTP 接口：
// - 系統健康檢查與 Prometheus 指標
// - 快取統計、模式失效與清空
// - 為上層服務路由掛載 HTTP 回應快取

/// REST API實現
pub mod rest;
/// API路由定義
pub mod routes;
/// API處理器模組
pub mod handlers;
/// 處理器共享狀態
pub mod state;

pub use rest::RestApi;
pub use state::AppState;

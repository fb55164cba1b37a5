/// 配置管理模組
///
/// 本模組負責加載、驗證配置，並轉換為各元件使用的運行時配置。
/// 支持開發與生產兩種環境的配置文件，環境變數可覆蓋文件中的任意欄位。
// 宣告子模組
pub mod loader;
pub mod manager;
pub mod types;
pub mod validation;

// 重新導出常用組件
pub use loader::{ConfigLoader, Environment};
pub use types::*;
pub use validation::{validate_config, ValidationError, ValidationUtils, Validator};

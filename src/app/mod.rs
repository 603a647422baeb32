// ==========================================
// OBARI 生命周期引擎 - 应用层
// ==========================================
// 职责: 组装仓储/引擎/API, 供 CLI 与表单处理器共享
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};

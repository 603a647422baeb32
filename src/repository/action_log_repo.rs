// ==========================================
// OBARI 生命周期引擎 - 操作日志数据仓储
// ==========================================
// 红线: 只追加, 不修改, 不删除
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;

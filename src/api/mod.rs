// ==========================================
// OBARI 生命周期引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供表单处理器/CLI 调用
// ==========================================

pub mod deal_api;
pub mod error;
pub mod stock_api;

// 重导出核心类型
pub use deal_api::{DealApi, GateResponse};
pub use error::{ApiError, ApiResult};
pub use stock_api::StockApi;

use chrono::{NaiveDateTime, Timelike};

/// 当前本地时间 (秒级, 与存储精度一致)
pub(crate) fn now_ts() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

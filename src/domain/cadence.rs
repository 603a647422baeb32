// ==========================================
// OBARI 生命周期引擎 - 周期窗口值对象
// ==========================================
// 派生值, 不持久化; 由 CadenceScheduler 按日期计算
// ==========================================

use crate::domain::types::WeekSlot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// CadenceWindow - 7 天执行窗口
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceWindow {
    pub start: NaiveDate, // 含
    pub end: NaiveDate,   // 不含
    pub week_slot: WeekSlot,
    pub label: String,
}

impl CadenceWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

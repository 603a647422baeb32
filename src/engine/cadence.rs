// ==========================================
// OBARI 生命周期引擎 - 周期排程器
// ==========================================
// 职责: 日期 → 四周循环槽位 (W1..W4) 与 7 天执行窗口
// 口径:
// - 锚点 = 当月 1 日当天或之后的第一个周日
// - 周起点 = 日期当天或之前的周日
// - 槽位序号 = floor((周起点 − 锚点) / 7), 小于 0 时取 0
// 已知限制: 月末最后一个槽位可能不足 7 天即被下月锚点截断
// ==========================================

use crate::domain::cadence::CadenceWindow;
use crate::domain::types::WeekSlot;
use chrono::{Datelike, Duration, NaiveDate};

/// 纯函数, 无状态
#[derive(Debug, Clone, Copy, Default)]
pub struct CadenceScheduler;

impl CadenceScheduler {
    pub fn new() -> Self {
        Self
    }

    /// 当月锚点: 1 日当天或之后的第一个周日
    ///
    /// 月份非法时返回 None
    pub fn month_anchor(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let offset = (7 - first.weekday().num_days_from_sunday()) % 7;
        Some(first + Duration::days(i64::from(offset)))
    }

    /// 日期当天或之前的周日
    pub fn sunday_of(&self, date: NaiveDate) -> NaiveDate {
        date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
    }

    /// 计算日期所在的周期槽位
    pub fn week_slot_for(&self, date: NaiveDate) -> WeekSlot {
        WeekSlot::from_index(self.slot_index(date))
    }

    /// 下一个槽位 (W4 → W1)
    pub fn next_week_slot(&self, date: NaiveDate) -> WeekSlot {
        self.week_slot_for(date).next()
    }

    /// 日期所在的 7 天执行窗口 [周日, 周日 + 7)
    pub fn window_for(&self, date: NaiveDate) -> CadenceWindow {
        let start = self.sunday_of(date);
        let week_slot = self.week_slot_for(date);
        // 标签取窗口周一的 ISO 周, 周日起点不会被归到上一 ISO 周
        let iso = (start + Duration::days(1)).iso_week();

        CadenceWindow {
            start,
            end: start + Duration::days(7),
            week_slot,
            label: format!("{}-W{:02}/{}", iso.year(), iso.week(), week_slot),
        }
    }

    fn slot_index(&self, date: NaiveDate) -> u32 {
        let anchor = match self.month_anchor(date.year(), date.month()) {
            Some(anchor) => anchor,
            None => return 0,
        };
        let days = (self.sunday_of(date) - anchor).num_days();
        if days <= 0 {
            0
        } else {
            (days / 7) as u32
        }
    }
}

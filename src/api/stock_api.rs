// ==========================================
// OBARI 生命周期引擎 - 库存 API
// ==========================================
// 职责: 库存流水记账 → 补货协调; 在库量/计划意图查询; 周期查询
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::error::{ApiError, ApiResult};
use crate::api::now_ts;
use crate::domain::cadence::CadenceWindow;
use crate::domain::replenishment::{PlanningIntent, StockConsumptionEvent};
use crate::domain::types::StockDirection;
use crate::engine::cadence::CadenceScheduler;
use crate::engine::coordinator::{CoordinatedOutcome, ReplenishmentCoordinator};
use crate::repository::planning_intent_repo::PlanningIntentRepository;
use crate::repository::stock_repo::{StockLedgerRepository, StockLevelReader};

pub struct StockApi {
    coordinator: Arc<ReplenishmentCoordinator>,
    ledger: Arc<StockLedgerRepository>,
    planning_repo: Arc<PlanningIntentRepository>,
    scheduler: CadenceScheduler,
}

impl StockApi {
    pub fn new(
        coordinator: Arc<ReplenishmentCoordinator>,
        ledger: Arc<StockLedgerRepository>,
        planning_repo: Arc<PlanningIntentRepository>,
    ) -> Self {
        Self {
            coordinator,
            ledger,
            planning_repo,
            scheduler: CadenceScheduler::new(),
        }
    }

    /// 记录库存变动并触发补货判断
    ///
    /// # 参数
    /// - item_id: 物料编码
    /// - quantity: 数量 (正数)
    /// - direction: "IN" / "OUT"
    /// - reference: 关联单号
    pub fn record_movement(
        &self,
        item_id: &str,
        quantity: f64,
        direction: &str,
        reference: Option<&str>,
    ) -> ApiResult<CoordinatedOutcome> {
        if item_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("物料编码不能为空".to_string()));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ApiError::InvalidInput(format!("数量必须为正数: {}", quantity)));
        }
        let direction = StockDirection::parse(direction)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知流水方向: {}", direction)))?;

        let event = StockConsumptionEvent {
            item_id: item_id.trim().to_string(),
            quantity,
            direction,
        };
        Ok(self
            .coordinator
            .record_and_observe(&event, reference, now_ts())?)
    }

    pub fn on_hand(&self, item_id: &str) -> ApiResult<f64> {
        Ok(self.ledger.on_hand(item_id)?)
    }

    pub fn planning_intents(&self, item_id: &str) -> ApiResult<Vec<PlanningIntent>> {
        Ok(self.planning_repo.list_by_item(item_id)?)
    }

    /// 日期所在的执行窗口 (格式 YYYY-MM-DD)
    pub fn cadence_window(&self, date: &str) -> ApiResult<CadenceWindow> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| ApiError::InvalidInput(format!("日期格式错误: {} ({})", date, e)))?;
        Ok(self.scheduler.window_for(date))
    }
}

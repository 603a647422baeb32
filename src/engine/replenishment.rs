// ==========================================
// OBARI 生命周期引擎 - 补货观察者
// ==========================================
// 职责: 库存消耗事件 → 是否补货 → 补货量 → 新订单意图
// 口径:
// - 仅 OUT 方向事件参与判断
// - 在库量 > 再订货点: 不补货
// - 补货量 = max(滑动窗口 OUT 合计 / 4 × 安全系数, 最小补货量)
// 红线: 只产出意图值, 不直接创建交易 (由编排层回灌流水线)
// 已知限制: 重复调用不去重, 串行化由 ReplenishmentCoordinator 负责
// ==========================================

use crate::config::ReplenishmentConfigReader;
use crate::domain::replenishment::{
    NewOrderIntent, PlanningIntent, ReplenishmentOutcome, ReplenishmentSignal,
    StockConsumptionEvent,
};
use crate::domain::types::StockDirection;
use crate::engine::cadence::CadenceScheduler;
use crate::repository::error::RepositoryError;
use crate::repository::planning_intent_repo::PlanningIntentSink;
use crate::repository::stock_repo::StockLevelReader;
use chrono::NaiveDateTime;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// 滑动窗口折算周数
const WEEKS_PER_WINDOW: f64 = 4.0;

/// 补货单默认计量单位
pub const DEFAULT_REORDER_UOM: &str = "EA";

// ==========================================
// ReplenishmentError
// ==========================================
#[derive(Error, Debug)]
pub enum ReplenishmentError {
    #[error("无效的消耗事件: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// ReplenishmentObserver
// ==========================================
pub struct ReplenishmentObserver {
    stock: Arc<dyn StockLevelReader>,
    planning: Arc<dyn PlanningIntentSink>,
    config: Arc<dyn ReplenishmentConfigReader>,
    scheduler: CadenceScheduler,
}

impl ReplenishmentObserver {
    pub fn new(
        stock: Arc<dyn StockLevelReader>,
        planning: Arc<dyn PlanningIntentSink>,
        config: Arc<dyn ReplenishmentConfigReader>,
    ) -> Self {
        Self {
            stock,
            planning,
            config,
            scheduler: CadenceScheduler::new(),
        }
    }

    /// 处理一次库存变动事件
    ///
    /// # 参数
    /// - `event`: 消耗事件 (调用前流水应已入账)
    /// - `now`: 事件时间, 决定滑动窗口终点与下一槽位
    ///
    /// # 返回
    /// - `IgnoredInbound`: 入库事件
    /// - `AboveReorderPoint`: 库存充足
    /// - `Triggered`: 已生成新订单意图并记录计划意图
    #[instrument(skip(self, event), fields(item_id = %event.item_id))]
    pub fn on_consumption(
        &self,
        event: &StockConsumptionEvent,
        now: NaiveDateTime,
    ) -> Result<ReplenishmentOutcome, ReplenishmentError> {
        let outcome = self.assess(event, now)?;
        if let Some(intent) = outcome.intent() {
            self.planning.record(&PlanningIntent::pending_price(intent))?;
        }
        Ok(outcome)
    }

    /// 补货判断 (只读, 不记录计划意图)
    ///
    /// 由调用方把计划意图与下游写入放在同一事务内提交
    pub fn assess(
        &self,
        event: &StockConsumptionEvent,
        now: NaiveDateTime,
    ) -> Result<ReplenishmentOutcome, ReplenishmentError> {
        if event.item_id.trim().is_empty() {
            return Err(ReplenishmentError::InvalidEvent("item_id 不能为空".to_string()));
        }
        if event.direction != StockDirection::Out {
            tracing::debug!("入库事件, 跳过补货判断");
            return Ok(ReplenishmentOutcome::IgnoredInbound);
        }

        let item_id = event.item_id.trim();
        let on_hand = self.stock.on_hand(item_id)?;
        let reorder_point = self.config.reorder_point(item_id)?;
        if on_hand > reorder_point {
            tracing::debug!(on_hand, reorder_point, "库存高于再订货点");
            return Ok(ReplenishmentOutcome::AboveReorderPoint {
                on_hand,
                reorder_point,
            });
        }

        let window_days = self.config.trailing_window_days()?;
        let total_out = self.stock.trailing_consumption(item_id, window_days, now)?;
        let reorder_qty = compute_reorder_qty(
            total_out,
            self.config.safety_factor()?,
            self.config.minimum_floor()?,
        );

        let signal = ReplenishmentSignal {
            item_id: item_id.to_string(),
            reorder_qty,
            triggered_at: now,
        };
        let intent = NewOrderIntent {
            intent_id: Uuid::new_v4().to_string(),
            item_id: signal.item_id.clone(),
            reorder_qty: signal.reorder_qty,
            week_slot: self.scheduler.next_week_slot(now.date()),
            unit_price: 0.0,
            uom: DEFAULT_REORDER_UOM.to_string(),
            supplier_ref: None,
            triggered_at: now,
        };
        tracing::info!(
            on_hand,
            reorder_point,
            total_out,
            reorder_qty,
            week_slot = %intent.week_slot,
            intent_id = %intent.intent_id,
            "触发补货"
        );
        Ok(ReplenishmentOutcome::Triggered { signal, intent })
    }
}

/// 补货量 = max(窗口消耗 / 4 × 安全系数, 最小补货量)
pub fn compute_reorder_qty(total_out: f64, safety_factor: f64, minimum_floor: f64) -> f64 {
    let average_weekly = total_out / WEEKS_PER_WINDOW;
    (average_weekly * safety_factor).max(minimum_floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::RepositoryResult;
    use crate::domain::types::WeekSlot;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct FixedStock {
        on_hand: f64,
        trailing: f64,
    }

    impl StockLevelReader for FixedStock {
        fn on_hand(&self, _item_id: &str) -> RepositoryResult<f64> {
            Ok(self.on_hand)
        }

        fn trailing_consumption(&self, _: &str, _: i64, _: NaiveDateTime) -> RepositoryResult<f64> {
            Ok(self.trailing)
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<PlanningIntent>>);

    impl PlanningIntentSink for RecordingSink {
        fn record(&self, intent: &PlanningIntent) -> RepositoryResult<()> {
            self.0.lock().unwrap().push(intent.clone());
            Ok(())
        }
    }

    struct Defaults;

    impl ReplenishmentConfigReader for Defaults {
        fn reorder_point(&self, _: &str) -> RepositoryResult<f64> {
            Ok(10.0)
        }
        fn minimum_floor(&self) -> RepositoryResult<f64> {
            Ok(5.0)
        }
        fn safety_factor(&self) -> RepositoryResult<f64> {
            Ok(1.2)
        }
        fn trailing_window_days(&self) -> RepositoryResult<i64> {
            Ok(28)
        }
    }

    fn observer(on_hand: f64, trailing: f64) -> (ReplenishmentObserver, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (
            ReplenishmentObserver::new(
                Arc::new(FixedStock { on_hand, trailing }),
                sink.clone(),
                Arc::new(Defaults),
            ),
            sink,
        )
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 12)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_forty_units_reorders_twelve() {
        let (obs, sink) = observer(8.0, 40.0);
        let outcome = obs
            .on_consumption(&StockConsumptionEvent::outbound("SKU-1", 3.0), now())
            .unwrap();

        let intent = outcome.intent().unwrap();
        assert!((intent.reorder_qty - 12.0).abs() < 1e-9);
        assert_eq!(intent.unit_price, 0.0);
        assert_eq!(intent.week_slot, WeekSlot::W3);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_assess_does_not_record() {
        let (obs, sink) = observer(8.0, 40.0);
        let outcome = obs
            .assess(&StockConsumptionEvent::outbound("SKU-1", 3.0), now())
            .unwrap();
        assert!(outcome.intent().is_some());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_floor_applies_to_slow_movers() {
        let (obs, _) = observer(2.0, 4.0);
        let outcome = obs
            .on_consumption(&StockConsumptionEvent::outbound("SKU-1", 1.0), now())
            .unwrap();
        assert_eq!(outcome.intent().unwrap().reorder_qty, 5.0);
    }

    #[test]
    fn test_above_reorder_point_does_nothing() {
        let (obs, sink) = observer(10.5, 40.0);
        let outcome = obs
            .on_consumption(&StockConsumptionEvent::outbound("SKU-1", 1.0), now())
            .unwrap();
        assert!(matches!(outcome, ReplenishmentOutcome::AboveReorderPoint { .. }));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exactly_at_reorder_point_triggers() {
        let (obs, _) = observer(10.0, 40.0);
        let outcome = obs
            .on_consumption(&StockConsumptionEvent::outbound("SKU-1", 1.0), now())
            .unwrap();
        assert!(outcome.intent().is_some());
    }

    #[test]
    fn test_inbound_events_ignored() {
        let (obs, sink) = observer(0.0, 40.0);
        let event = StockConsumptionEvent {
            item_id: "SKU-1".to_string(),
            quantity: 50.0,
            direction: StockDirection::In,
        };
        assert_eq!(
            obs.on_consumption(&event, now()).unwrap(),
            ReplenishmentOutcome::IgnoredInbound
        );
        assert!(sink.0.lock().unwrap().is_empty());
    }
}

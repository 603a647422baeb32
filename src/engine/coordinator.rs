// ==========================================
// OBARI 生命周期引擎 - 补货协调器
// ==========================================
// 职责: 补货观察者与交易流水线之间的集成边界
// 并发: 同一物料同一时刻只允许一个 "记账-观察-下单" 流程
//       (每个物料一把 Arc<Mutex<()>>, 注册表惰性创建, 无人持有时释放)
// ==========================================

use crate::domain::replenishment::{ReplenishmentOutcome, StockConsumptionEvent, StockMovement};
use crate::domain::types::StockDirection;
use crate::engine::lifecycle::{DealLifecycleService, LifecycleError, ReplenishmentDeal};
use crate::engine::replenishment::{ReplenishmentError, ReplenishmentObserver};
use crate::repository::error::RepositoryError;
use crate::repository::stock_repo::StockLedgerRepository;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 系统动作的操作人
pub const SYSTEM_ACTOR: &str = "system";

/// 协调结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatedOutcome {
    pub outcome: ReplenishmentOutcome,
    /// 触发补货时回灌生成的交易与草稿
    pub issued: Option<ReplenishmentDeal>,
}

// ==========================================
// ReplenishmentCoordinator
// ==========================================
pub struct ReplenishmentCoordinator {
    observer: Arc<ReplenishmentObserver>,
    lifecycle: Arc<DealLifecycleService>,
    ledger: Arc<StockLedgerRepository>,
    item_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReplenishmentCoordinator {
    pub fn new(
        observer: Arc<ReplenishmentObserver>,
        lifecycle: Arc<DealLifecycleService>,
        ledger: Arc<StockLedgerRepository>,
    ) -> Self {
        Self {
            observer,
            lifecycle,
            ledger,
            item_locks: Mutex::new(HashMap::new()),
        }
    }

    fn item_lock(&self, item_id: &str) -> Result<Arc<Mutex<()>>, LifecycleError> {
        let mut locks = self
            .item_locks
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(locks
            .entry(item_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 在物料锁内执行, 结束后若无其他持有者则移出注册表
    fn with_item_lock<T>(
        &self,
        item_id: &str,
        work: impl FnOnce() -> Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        let lock = self.item_lock(item_id)?;
        let result = {
            let _guard = lock
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            work()
        };
        drop(lock);

        if let Ok(mut locks) = self.item_locks.lock() {
            // 注册表锁内只剩注册表自身的引用时, 没有线程在等待该物料
            if locks.get(item_id).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(item_id);
            }
        }
        result
    }

    /// 注册表中的物料锁数量
    pub fn tracked_items(&self) -> usize {
        self.item_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    /// 观察一次消耗事件 (流水已入账), 触发时回灌交易流水线
    pub fn on_consumption(
        &self,
        event: &StockConsumptionEvent,
        now: NaiveDateTime,
    ) -> Result<CoordinatedOutcome, LifecycleError> {
        self.with_item_lock(event.item_id.trim(), || self.observe_and_issue(event, now))
    }

    /// 记账并观察 (同一物料锁内完成, 观察到的在库量包含本笔流水)
    ///
    /// # 参数
    /// - `reference`: 关联单号 (可选)
    pub fn record_and_observe(
        &self,
        event: &StockConsumptionEvent,
        reference: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<CoordinatedOutcome, LifecycleError> {
        let item_id = event.item_id.trim();
        if item_id.is_empty() {
            return Err(ReplenishmentError::InvalidEvent("item_id 不能为空".to_string()).into());
        }

        self.with_item_lock(item_id, || {
            self.ledger.record(&StockMovement {
                movement_id: Uuid::new_v4().to_string(),
                item_id: item_id.to_string(),
                direction: event.direction,
                quantity: event.quantity,
                moved_at: now,
                reference: reference.map(|s| s.to_string()),
            })?;
            if event.direction == StockDirection::In {
                tracing::debug!(item_id, quantity = event.quantity, "入库流水已记账");
            }

            self.observe_and_issue(event, now)
        })
    }

    fn observe_and_issue(
        &self,
        event: &StockConsumptionEvent,
        now: NaiveDateTime,
    ) -> Result<CoordinatedOutcome, LifecycleError> {
        // 计划意图随交易一起写入 (ingest_replenishment 同一事务)
        let outcome = self.observer.assess(event, now)?;
        let issued = match outcome.intent() {
            Some(intent) => Some(self.lifecycle.ingest_replenishment(intent, SYSTEM_ACTOR)?),
            None => None,
        };
        Ok(CoordinatedOutcome { outcome, issued })
    }
}

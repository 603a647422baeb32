// ==========================================
// OBARI 生命周期引擎 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 闸门判定必须给出审计消息或缺失清单
// ==========================================

pub mod cadence;
pub mod coordinator;
pub mod events;
pub mod gate;
pub mod lifecycle;
pub mod replenishment;
pub mod repositories;
pub mod staging;

// 重导出核心引擎
pub use cadence::CadenceScheduler;
pub use coordinator::{CoordinatedOutcome, ReplenishmentCoordinator, SYSTEM_ACTOR};
pub use events::{
    LifecycleEvent, LifecycleEventPublisher, LifecycleEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use gate::{Gate, GateController, GateError};
pub use lifecycle::{AdvanceOutcome, DealLifecycleService, LifecycleError, ReplenishmentDeal};
pub use replenishment::{compute_reorder_qty, ReplenishmentError, ReplenishmentObserver};
pub use repositories::LifecycleRepositories;
pub use staging::{OrderStagingService, StagingError};

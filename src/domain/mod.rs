// ==========================================
// OBARI 生命周期引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod cadence;
pub mod deal;
pub mod replenishment;
pub mod staging;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use cadence::CadenceWindow;
pub use deal::{
    AgreementWindow, Deal, DealFacts, DealOrigin, DocumentRef, FactError, FactKey, FactKind,
    FactValue,
};
pub use replenishment::{
    NewOrderIntent, PlanningIntent, ReplenishmentOutcome, ReplenishmentSignal,
    StockConsumptionEvent, StockMovement,
};
pub use staging::{
    OrderDraft, OrderLine, OrderStagingSnapshot, ScheduleDescriptor, SnapshotNotes,
    TransportTerms,
};
pub use types::{
    CadenceKind, DealStatus, Direction, SnapshotStatus, StockDirection, TransportClass, WeekSlot,
};

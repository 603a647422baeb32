// ==========================================
// OBARI 生命周期引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod deal_repo;
pub mod error;
pub mod number_series_repo;
pub mod planning_intent_repo;
pub mod staging_repo;
pub mod stock_repo;
pub mod unit_of_work;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use deal_repo::DealRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use number_series_repo::{NumberSeries, SqliteNumberSeries};
pub use planning_intent_repo::{PlanningIntentRepository, PlanningIntentSink};
pub use staging_repo::{OrderStagingStore, SqliteOrderStagingStore};
pub use stock_repo::{StockLedgerRepository, StockLevelReader};
pub use unit_of_work::UnitOfWork;

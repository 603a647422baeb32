// ==========================================
// OBARI 生命周期引擎 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合生命周期服务所需的所有 Repository
// 目标: 减少 DealLifecycleService 的构造函数参数数量
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    ActionLogRepository, DealRepository, NumberSeries, OrderStagingStore, SqliteNumberSeries,
    SqliteOrderStagingStore, UnitOfWork,
};

/// 生命周期仓储集合
///
/// # 包含的仓储
/// - `deal_repo`: 交易头与事实包
/// - `staging_store`: 暂存快照
/// - `number_series`: 快照编号
/// - `action_log_repo`: 交易历史
/// - `unit_of_work`: 交易 / 审计 / 计划意图的多表写入事务
#[derive(Clone)]
pub struct LifecycleRepositories {
    pub deal_repo: Arc<DealRepository>,
    pub staging_store: Arc<dyn OrderStagingStore>,
    pub number_series: Arc<dyn NumberSeries>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub unit_of_work: UnitOfWork,
}

impl LifecycleRepositories {
    pub fn new(
        deal_repo: Arc<DealRepository>,
        staging_store: Arc<dyn OrderStagingStore>,
        number_series: Arc<dyn NumberSeries>,
        action_log_repo: Arc<ActionLogRepository>,
        unit_of_work: UnitOfWork,
    ) -> Self {
        Self {
            deal_repo,
            staging_store,
            number_series,
            action_log_repo,
            unit_of_work,
        }
    }

    /// 基于同一共享连接构建全部 SQLite 实现
    pub fn sqlite(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            deal_repo: Arc::new(DealRepository::new(conn.clone())),
            staging_store: Arc::new(SqliteOrderStagingStore::new(conn.clone())),
            number_series: Arc::new(SqliteNumberSeries::new(conn.clone())),
            action_log_repo: Arc::new(ActionLogRepository::new(conn.clone())),
            unit_of_work: UnitOfWork::new(conn),
        }
    }
}

// ==========================================
// OBARI 生命周期引擎 - 核心库
// ==========================================
// 职责: 交易生命周期闸门 + 订单暂存快照 + 周期排程 + 补货观察
// 技术栈: Rust + SQLite
// 系统定位: 运营后台引擎 (表单处理器/CLI 调用)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 性能埋点
pub mod perf;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CadenceKind, DealStatus, Direction, SnapshotStatus, StockDirection, TransportClass, WeekSlot,
};

// 引擎
pub use engine::{
    CadenceScheduler, DealLifecycleService, GateController, OrderStagingService,
    ReplenishmentCoordinator, ReplenishmentObserver,
};

// API
pub use api::{ApiError, ApiResult, DealApi, StockApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "OBARI 生命周期引擎";

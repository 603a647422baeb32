// ==========================================
// OBARI 生命周期引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{DealApi, StockApi};
use crate::config::{config_keys, ConfigManager, ReplenishmentConfigReader};
use crate::engine::coordinator::ReplenishmentCoordinator;
use crate::engine::lifecycle::DealLifecycleService;
use crate::engine::replenishment::ReplenishmentObserver;
use crate::engine::repositories::LifecycleRepositories;
use crate::engine::OptionalEventPublisher;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::planning_intent_repo::PlanningIntentRepository;
use crate::repository::stock_repo::StockLedgerRepository;

/// 应用状态
///
/// 包含所有API实例和共享资源 (单一共享连接)
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 交易生命周期API
    pub deal_api: Arc<DealApi>,

    /// 库存/补货API
    pub stock_api: Arc<StockApi>,

    /// 配置管理
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并建表
    /// 2. 初始化所有Repository
    /// 3. 按配置组装生命周期服务与补货协调器
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let repos = LifecycleRepositories::sqlite(conn.clone());
        let action_log_repo = repos.action_log_repo.clone();
        let ledger = Arc::new(StockLedgerRepository::new(conn.clone()));
        let planning_repo = Arc::new(PlanningIntentRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let mut lifecycle = DealLifecycleService::new(repos)
            .with_publisher(OptionalEventPublisher::none());
        if let Some(series) = config_value(&config_manager, config_keys::SNAPSHOT_SERIES)? {
            lifecycle = lifecycle.with_snapshot_series(&series);
        }
        if let Some(party) = config_value(&config_manager, config_keys::OUR_PARTY_REF)? {
            lifecycle = lifecycle.with_our_party_ref(&party);
        }
        let lifecycle = Arc::new(lifecycle);

        let config_reader: Arc<dyn ReplenishmentConfigReader> = config_manager.clone();
        let observer = Arc::new(ReplenishmentObserver::new(
            ledger.clone(),
            planning_repo.clone(),
            config_reader,
        ));
        let coordinator = Arc::new(ReplenishmentCoordinator::new(
            observer,
            lifecycle.clone(),
            ledger.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let deal_api = Arc::new(DealApi::new(lifecycle));
        let stock_api = Arc::new(StockApi::new(coordinator, ledger, planning_repo));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            deal_api,
            stock_api,
            config_manager,
            action_log_repo,
        })
    }
}

fn config_value(config: &ConfigManager, key: &str) -> Result<Option<String>, String> {
    let value = config
        .get_global_config_value(key)
        .map_err(|e| format!("读取配置失败 {}: {}", key, e))?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

// ==========================================
// 辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - OBARI_DB_PATH 环境变量 (如已设置)
/// - 否则: 用户数据目录/obari/obari.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("OBARI_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./obari.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("obari");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("obari.db");
        }
    }

    path.to_string_lossy().to_string()
}

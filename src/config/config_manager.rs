// ==========================================
// OBARI 生命周期引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::replenishment_config_trait::ReplenishmentConfigReader;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// 默认值
const DEFAULT_REORDER_POINT: f64 = 10.0;
const DEFAULT_MINIMUM_FLOOR: f64 = 5.0;
const DEFAULT_SAFETY_FACTOR: f64 = 1.2;
const DEFAULT_TRAILING_WINDOW_DAYS: i64 = 28;
// 滑动窗口上限 (约十年)
const MAX_TRAILING_WINDOW_DAYS: i64 = 3650;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RepositoryError::field("key", "配置键不能为空"));
        }
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式, 键有序）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let config_map = stmt
            .query_map(params![GLOBAL_SCOPE], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取正数配置, 缺失、格式错误或非正数时回退默认值
    fn get_positive_f64_or_default(&self, key: &str, default: f64) -> RepositoryResult<f64> {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = default,
                    "数值配置格式错误或非正数，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// ReplenishmentConfigReader Trait 实现
// ==========================================
impl ReplenishmentConfigReader for ConfigManager {
    fn reorder_point(&self, item_id: &str) -> RepositoryResult<f64> {
        let global = self.get_positive_f64_or_default(config_keys::REORDER_POINT, DEFAULT_REORDER_POINT)?;
        self.get_positive_f64_or_default(&config_keys::item_reorder_point(item_id), global)
    }

    fn minimum_floor(&self) -> RepositoryResult<f64> {
        self.get_positive_f64_or_default(config_keys::MINIMUM_FLOOR, DEFAULT_MINIMUM_FLOOR)
    }

    fn safety_factor(&self) -> RepositoryResult<f64> {
        self.get_positive_f64_or_default(config_keys::SAFETY_FACTOR, DEFAULT_SAFETY_FACTOR)
    }

    fn trailing_window_days(&self) -> RepositoryResult<i64> {
        let value = self.get_global_config_value(config_keys::TRAILING_WINDOW_DAYS)?;
        let days = value.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
        match days {
            Some(d) if (1..=MAX_TRAILING_WINDOW_DAYS).contains(&d) => Ok(d),
            Some(d) => {
                tracing::warn!(
                    config_key = config_keys::TRAILING_WINDOW_DAYS,
                    raw_value = d,
                    default = DEFAULT_TRAILING_WINDOW_DAYS,
                    "滑动窗口天数超出范围 1..={}，使用默认值",
                    MAX_TRAILING_WINDOW_DAYS
                );
                Ok(DEFAULT_TRAILING_WINDOW_DAYS)
            }
            None => Ok(DEFAULT_TRAILING_WINDOW_DAYS),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 补货阈值
    pub const REORDER_POINT: &str = "replenishment/reorder_point";
    pub const MINIMUM_FLOOR: &str = "replenishment/minimum_floor";
    pub const SAFETY_FACTOR: &str = "replenishment/safety_factor";
    pub const TRAILING_WINDOW_DAYS: &str = "replenishment/trailing_window_days";

    // 暂存快照编号前缀
    pub const SNAPSHOT_SERIES: &str = "staging/snapshot_series";

    // 我方主体
    pub const OUR_PARTY_REF: &str = "party/our_party_ref";

    /// 物料级再订货点: replenishment/reorder_point/{item}
    pub fn item_reorder_point(item_id: &str) -> String {
        format!("{}/{}", REORDER_POINT, item_id.trim())
    }
}

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult, TS_FORMAT};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, log)
    }

    /// 在调用方持有的连接/事务上追加 (随事务一起提交)
    pub fn insert_in(conn: &Connection, log: &ActionLog) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, deal_id, action_type, action_ts, actor,
                from_status, to_status, detail, payload_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                log.action_id,
                log.deal_id,
                log.action_type,
                log.action_ts.format(TS_FORMAT).to_string(),
                log.actor,
                log.from_status.map(|s| s.as_str()),
                log.to_status.map(|s| s.as_str()),
                log.detail,
                log.payload_json.as_ref().map(|v| v.to_string()),
            ],
        )?;

        Ok(log.action_id.clone())
    }
}

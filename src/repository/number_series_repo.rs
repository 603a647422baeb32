// ==========================================
// OBARI 生命周期引擎 - 编号序列仓储
// ==========================================
// 职责: 为暂存快照等发放单调递增、永不复用的编号
// 格式: {series}-{000001}
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// NumberSeries Trait
// ==========================================
pub trait NumberSeries: Send + Sync {
    /// 取下一个编号 (失败时不得返回已发放过的编号)
    fn next_number(&self, series: &str) -> RepositoryResult<String>;
}

pub struct SqliteNumberSeries {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNumberSeries {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl NumberSeries for SqliteNumberSeries {
    fn next_number(&self, series: &str) -> RepositoryResult<String> {
        let series = series.trim();
        if series.is_empty() {
            return Err(RepositoryError::field("series", "编号序列名不能为空"));
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO number_series (series, next_value) VALUES (?1, 1)
             ON CONFLICT(series) DO NOTHING",
            params![series],
        )?;
        let value: i64 = tx.query_row(
            "SELECT next_value FROM number_series WHERE series = ?1",
            params![series],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE number_series SET next_value = next_value + 1 WHERE series = ?1",
            params![series],
        )?;
        tx.commit()?;

        Ok(format!("{}-{:06}", series, value))
    }
}

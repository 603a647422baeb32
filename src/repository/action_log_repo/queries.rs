use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::domain::types::DealStatus;
use crate::repository::error::{RepositoryResult, TS_FORMAT};
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const ACTION_LOG_COLUMNS: &str = r#"
    action_id, deal_id, action_type, action_ts, actor,
    from_status, to_status, detail, payload_json
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?1", ACTION_LOG_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![action_id], map_row) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询交易历史 (时间升序)
    pub fn find_by_deal_id(&self, deal_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE deal_id = ?1 ORDER BY action_ts ASC, rowid ASC",
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![deal_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定操作类型的最近日志
    pub fn find_by_action_type(&self, action_type: &str, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE action_type = ?1 ORDER BY action_ts DESC, rowid DESC LIMIT ?2",
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![action_type, limit as i64], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }
}

// ==========================================
// 辅助方法
// ==========================================

fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let action_ts_str: String = row.get(3)?;
    let from_status: Option<String> = row.get(5)?;
    let to_status: Option<String> = row.get(6)?;
    let payload_json_str: Option<String> = row.get(8)?;

    // 解析时间戳
    let action_ts = NaiveDateTime::parse_from_str(&action_ts_str, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        deal_id: row.get(1)?,
        action_type: row.get(2)?,
        action_ts,
        actor: row.get(4)?,
        from_status: from_status.as_deref().and_then(DealStatus::parse),
        to_status: to_status.as_deref().and_then(DealStatus::parse),
        detail: row.get(7)?,
        payload_json: payload_json_str.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

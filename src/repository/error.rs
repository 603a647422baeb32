// ==========================================
// OBARI 生命周期引擎 - 仓储层错误类型
// ==========================================
// 说明: 基础设施错误原样上抛, 核心逻辑不做重试
// 约定: 时间戳统一以 TS_FORMAT 文本存储
// ==========================================

use chrono::NaiveDateTime;
use thiserror::Error;

/// 快照触发器 RAISE 的消息片段
const IMMUTABLE_MARKER: &str = "immutable";

#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 并发控制 =====
    #[error("乐观锁冲突: entity_id={entity_id}, expected_revision={expected}, actual_revision={actual}")]
    OptimisticLockFailure {
        entity_id: String,
        expected: i32,
        actual: i32,
    },

    #[error("记录已锁定, 不可修改: {0}")]
    ImmutableRecord(String),

    // ===== 数据库 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 存储值 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// 存储列解析失败的便捷构造
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        RepositoryError::FieldValueError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains(IMMUTABLE_MARKER) {
                    RepositoryError::ImmutableRecord(msg)
                } else if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "row".to_string(),
                id: "-".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::InternalError(format!("JSON 编解码失败: {}", err))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 时间戳存储格式
pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn parse_ts(field: &str, raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| RepositoryError::field(field, format!("{} ({})", e, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_abort_maps_to_immutable() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO order_staging (snapshot_id, draft_id, deal_id, direction, counterparty_ref, \
             our_party_ref, schedule_json, transport_terms_json, transport_class, lines_json, notes, \
             created_at, status) VALUES ('S1', 'D1', NULL, 'OUTBOUND', 'ACME', 'OBARI', '{}', '{}', \
             'CLIENT_ARRANGED', '[]', '', '2025-11-12 09:00:00', 'STAGING')",
            [],
        )
        .unwrap();

        let err: RepositoryError = conn
            .execute("UPDATE order_staging SET lines_json = '[1]' WHERE snapshot_id = 'S1'", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::ImmutableRecord(_)));
    }

    #[test]
    fn test_parse_ts_reports_field() {
        assert!(parse_ts("created_at", "2025-11-12 09:00:00").is_ok());
        match parse_ts("created_at", "yesterday") {
            Err(RepositoryError::FieldValueError { field, .. }) => assert_eq!(field, "created_at"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

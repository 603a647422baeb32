// ==========================================
// OBARI 生命周期引擎 - 交易仓储
// ==========================================
// 红线: Repository 不含业务逻辑 (状态合法性由闸门判定)
// 并发: update 使用 revision 乐观锁
// ==========================================

use crate::domain::deal::{Deal, DealFacts, DealOrigin};
use crate::domain::types::{DealStatus, Direction};
use crate::repository::error::{parse_ts, RepositoryError, RepositoryResult, TS_FORMAT};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const DEAL_COLUMNS: &str = r#"
    deal_id, counterparty_ref, direction, status, facts_json,
    origin, origin_ref, snapshot_id, supersedes, superseded_by,
    revision, created_at, updated_at
"#;

/// 原始行 (先取出再解析, 解析错误不混入 rusqlite::Error)
struct DealRow {
    deal_id: String,
    counterparty_ref: String,
    direction: String,
    status: String,
    facts_json: String,
    origin: String,
    origin_ref: Option<String>,
    snapshot_id: Option<String>,
    supersedes: Option<String>,
    superseded_by: Option<String>,
    revision: i32,
    created_at: String,
    updated_at: String,
}

impl DealRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            deal_id: row.get(0)?,
            counterparty_ref: row.get(1)?,
            direction: row.get(2)?,
            status: row.get(3)?,
            facts_json: row.get(4)?,
            origin: row.get(5)?,
            origin_ref: row.get(6)?,
            snapshot_id: row.get(7)?,
            supersedes: row.get(8)?,
            superseded_by: row.get(9)?,
            revision: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_deal(self) -> RepositoryResult<Deal> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| RepositoryError::field("direction", self.direction.clone()))?;
        let status = DealStatus::parse(&self.status)
            .ok_or_else(|| RepositoryError::field("status", self.status.clone()))?;
        let facts_value: serde_json::Value = serde_json::from_str(&self.facts_json)?;
        let facts = DealFacts::from_json(&facts_value)
            .map_err(|e| RepositoryError::field("facts_json", e.to_string()))?;
        let origin = DealOrigin::from_columns(&self.origin, self.origin_ref)
            .ok_or_else(|| RepositoryError::field("origin", self.origin.clone()))?;

        Ok(Deal {
            deal_id: self.deal_id,
            counterparty_ref: self.counterparty_ref,
            direction,
            status,
            facts,
            origin,
            snapshot_id: self.snapshot_id,
            supersedes: self.supersedes,
            superseded_by: self.superseded_by,
            revision: self.revision,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
        })
    }
}

// ==========================================
// DealRepository - 交易仓储
// ==========================================
pub struct DealRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DealRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入新交易
    pub fn insert(&self, deal: &Deal) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, deal)
    }

    /// 在调用方持有的连接/事务上插入
    pub fn insert_in(conn: &Connection, deal: &Deal) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO deal (
                deal_id, counterparty_ref, direction, status, facts_json,
                origin, origin_ref, snapshot_id, supersedes, superseded_by,
                revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                deal.deal_id,
                deal.counterparty_ref,
                deal.direction.as_str(),
                deal.status.as_str(),
                deal.facts.to_json().to_string(),
                deal.origin.as_str(),
                deal.origin.reference(),
                deal.snapshot_id,
                deal.supersedes,
                deal.superseded_by,
                deal.revision,
                deal.created_at.format(TS_FORMAT).to_string(),
                deal.updated_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, deal_id: &str) -> RepositoryResult<Option<Deal>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM deal WHERE deal_id = ?1", DEAL_COLUMNS);
        let row = conn
            .query_row(&sql, params![deal_id], DealRow::from_row)
            .optional()?;
        row.map(DealRow::into_deal).transpose()
    }

    /// 按 id 读取, 不存在时返回 NotFound
    pub fn get(&self, deal_id: &str) -> RepositoryResult<Deal> {
        self.find_by_id(deal_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Deal".to_string(),
            id: deal_id.to_string(),
        })
    }

    pub fn list_by_status(&self, status: DealStatus) -> RepositoryResult<Vec<Deal>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM deal WHERE status = ?1 ORDER BY created_at ASC, deal_id ASC",
            DEAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.as_str()], DealRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(DealRow::into_deal).collect()
    }

    /// 写回交易 (乐观锁)
    ///
    /// # 参数
    /// - `deal`: 新值, 其 revision 必须等于库中当前 revision
    ///
    /// # 返回
    /// - `Ok(revision)`: 写入后的 revision
    /// - `Err(OptimisticLockFailure)`: 期间被其他请求修改
    pub fn update(&self, deal: &Deal) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        Self::update_in(&conn, deal)
    }

    /// 在调用方持有的连接/事务上写回 (乐观锁语义同 update)
    pub fn update_in(conn: &Connection, deal: &Deal) -> RepositoryResult<i32> {
        let affected = conn.execute(
            r#"
            UPDATE deal SET
                status = ?1,
                facts_json = ?2,
                snapshot_id = ?3,
                superseded_by = ?4,
                updated_at = ?5,
                revision = revision + 1
            WHERE deal_id = ?6 AND revision = ?7
            "#,
            params![
                deal.status.as_str(),
                deal.facts.to_json().to_string(),
                deal.snapshot_id,
                deal.superseded_by,
                deal.updated_at.format(TS_FORMAT).to_string(),
                deal.deal_id,
                deal.revision,
            ],
        )?;

        if affected == 1 {
            return Ok(deal.revision + 1);
        }

        let actual: Option<i32> = conn
            .query_row(
                "SELECT revision FROM deal WHERE deal_id = ?1",
                params![deal.deal_id],
                |row| row.get(0),
            )
            .optional()?;

        match actual {
            None => Err(RepositoryError::NotFound {
                entity: "Deal".to_string(),
                id: deal.deal_id.clone(),
            }),
            Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                entity_id: deal.deal_id.clone(),
                expected: deal.revision,
                actual,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn ts(h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 3)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_insert_and_find_by_id() {
        let repo = DealRepository::new(setup_test_db());
        let mut deal = Deal::new_lead("ACME", Direction::Outbound, DealOrigin::Manual, ts(9));
        deal.facts = DealFacts::from_json(&json!({ "quoteId": "Q1", "channel": "web" })).unwrap();
        repo.insert(&deal).unwrap();

        let found = repo.find_by_id(&deal.deal_id).unwrap().unwrap();
        assert_eq!(found, deal);
        assert!(repo.find_by_id("missing").unwrap().is_none());
        assert!(matches!(
            repo.get("missing"),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_replenishment_origin_roundtrip() {
        let repo = DealRepository::new(setup_test_db());
        let origin = DealOrigin::Replenishment {
            intent_id: "INT-1".to_string(),
        };
        let deal = Deal::new_lead("SUP-9", Direction::Inbound, origin.clone(), ts(9));
        repo.insert(&deal).unwrap();

        let found = repo.get(&deal.deal_id).unwrap();
        assert_eq!(found.origin, origin);
        assert_eq!(found.direction, Direction::Inbound);
    }

    #[test]
    fn test_update_bumps_revision_and_detects_stale_writer() {
        let repo = DealRepository::new(setup_test_db());
        let deal = Deal::new_lead("ACME", Direction::Outbound, DealOrigin::Manual, ts(9));
        repo.insert(&deal).unwrap();

        let mut first = repo.get(&deal.deal_id).unwrap();
        let mut second = first.clone();

        first.status = DealStatus::QuoteAccepted;
        first.updated_at = ts(10);
        assert_eq!(repo.update(&first).unwrap(), 1);

        second.status = DealStatus::Cancelled;
        let err = repo.update(&second).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::OptimisticLockFailure {
                expected: 0,
                actual: 1,
                ..
            }
        ));

        let stored = repo.get(&deal.deal_id).unwrap();
        assert_eq!(stored.status, DealStatus::QuoteAccepted);
        assert_eq!(stored.revision, 1);
    }

    #[test]
    fn test_update_missing_deal_is_not_found() {
        let repo = DealRepository::new(setup_test_db());
        let deal = Deal::new_lead("ACME", Direction::Outbound, DealOrigin::Manual, ts(9));
        assert!(matches!(
            repo.update(&deal),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_by_status() {
        let repo = DealRepository::new(setup_test_db());
        let a = Deal::new_lead("A", Direction::Outbound, DealOrigin::Manual, ts(8));
        let b = Deal::new_lead("B", Direction::Outbound, DealOrigin::Manual, ts(9));
        repo.insert(&a).unwrap();
        repo.insert(&b).unwrap();

        let leads = repo.list_by_status(DealStatus::Lead).unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].counterparty_ref, "A");
        assert!(repo.list_by_status(DealStatus::Closed).unwrap().is_empty());
    }
}

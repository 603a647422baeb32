// ==========================================
// OBARI 生命周期引擎 - 计划意图仓储
// ==========================================
// 职责: 持久化补货计划意图, 供看板在定价前展示
// ==========================================

use crate::domain::replenishment::PlanningIntent;
use crate::domain::types::WeekSlot;
use crate::repository::error::{parse_ts, RepositoryError, RepositoryResult, TS_FORMAT};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// PlanningIntentSink Trait
// ==========================================
pub trait PlanningIntentSink: Send + Sync {
    fn record(&self, intent: &PlanningIntent) -> RepositoryResult<()>;
}

pub struct PlanningIntentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanningIntentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按物料查询计划意图 (时间升序)
    pub fn list_by_item(&self, item_id: &str) -> RepositoryResult<Vec<PlanningIntent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT intent_id, item_id, quantity, week_slot, status, created_at
            FROM planning_intent
            WHERE item_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![item_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(intent_id, item_id, quantity, week_slot, status, created_at)| {
                Ok(PlanningIntent {
                    intent_id,
                    item_id,
                    quantity,
                    week_slot: WeekSlot::parse(&week_slot)
                        .ok_or_else(|| RepositoryError::field("week_slot", week_slot.clone()))?,
                    status,
                    created_at: parse_ts("created_at", &created_at)?,
                })
            })
            .collect()
    }

    pub fn count_by_status(&self, status: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM planning_intent WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl PlanningIntentRepository {
    /// 在调用方持有的连接/事务上写入; 同一 intent_id 已存在时不重复写入
    ///
    /// # 返回
    /// - `Ok(true)`: 新写入
    /// - `Ok(false)`: 已存在
    pub fn record_if_absent_in(conn: &Connection, intent: &PlanningIntent) -> RepositoryResult<bool> {
        let affected = conn.execute(
            r#"
            INSERT INTO planning_intent (intent_id, item_id, quantity, week_slot, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(intent_id) DO NOTHING
            "#,
            params![
                intent.intent_id,
                intent.item_id,
                intent.quantity,
                intent.week_slot.as_str(),
                intent.status,
                intent.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(affected == 1)
    }
}

impl PlanningIntentSink for PlanningIntentRepository {
    fn record(&self, intent: &PlanningIntent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO planning_intent (intent_id, item_id, quantity, week_slot, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                intent.intent_id,
                intent.item_id,
                intent.quantity,
                intent.week_slot.as_str(),
                intent.status,
                intent.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::replenishment::PLANNING_STATUS_PENDING_PRICE;
    use chrono::NaiveDate;

    #[test]
    fn test_record_and_list() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let repo = PlanningIntentRepository::new(Arc::new(Mutex::new(conn)));

        let intent = PlanningIntent {
            intent_id: "INT-1".to_string(),
            item_id: "SKU-1".to_string(),
            quantity: 12.0,
            week_slot: WeekSlot::W3,
            status: PLANNING_STATUS_PENDING_PRICE.to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 11, 12)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        };
        repo.record(&intent).unwrap();

        assert_eq!(repo.list_by_item("SKU-1").unwrap(), vec![intent.clone()]);
        assert_eq!(repo.count_by_status(PLANNING_STATUS_PENDING_PRICE).unwrap(), 1);
        assert!(repo.record(&repo.list_by_item("SKU-1").unwrap()[0]).is_err());

        let conn = repo.get_conn().unwrap();
        assert!(!PlanningIntentRepository::record_if_absent_in(&conn, &intent).unwrap());
    }
}

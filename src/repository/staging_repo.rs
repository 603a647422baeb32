// ==========================================
// OBARI 生命周期引擎 - 订单暂存快照仓储
// ==========================================
// 红线: 只有 create / 读取 / notes 字段写入三种操作
//       不存在通用 update; notes 写入只触碰 notes 列
// 并发: 共享连接互斥, 同一快照的写入天然串行
// ==========================================

use crate::domain::staging::{
    OrderLine, OrderStagingSnapshot, ScheduleDescriptor, SnapshotNotes, SnapshotParts,
    TransportTerms,
};
use crate::domain::types::{Direction, SnapshotStatus, TransportClass};
use crate::repository::error::{parse_ts, RepositoryError, RepositoryResult, TS_FORMAT};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderStagingStore Trait
// ==========================================
// 实现者: SqliteOrderStagingStore
pub trait OrderStagingStore: Send + Sync {
    /// 写入新快照 (snapshot_id / draft_id 均唯一)
    fn create(&self, snapshot: &OrderStagingSnapshot) -> RepositoryResult<()>;

    fn get_by_id(&self, snapshot_id: &str) -> RepositoryResult<Option<OrderStagingSnapshot>>;

    fn find_by_draft_id(&self, draft_id: &str) -> RepositoryResult<Option<OrderStagingSnapshot>>;

    /// 仅写入 notes 字段
    ///
    /// # 返回
    /// - `Ok(true)`: 已写入
    /// - `Ok(false)`: 快照不存在
    fn update_notes(&self, snapshot_id: &str, notes: &SnapshotNotes) -> RepositoryResult<bool>;
}

const STAGING_COLUMNS: &str = r#"
    snapshot_id, draft_id, deal_id, direction, counterparty_ref, our_party_ref,
    schedule_json, transport_terms_json, transport_class, lines_json,
    notes, created_at, status
"#;

struct StagingRow {
    snapshot_id: String,
    draft_id: String,
    deal_id: Option<String>,
    direction: String,
    counterparty_ref: String,
    our_party_ref: String,
    schedule_json: String,
    transport_terms_json: String,
    transport_class: String,
    lines_json: String,
    notes: String,
    created_at: String,
    status: String,
}

impl StagingRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            snapshot_id: row.get(0)?,
            draft_id: row.get(1)?,
            deal_id: row.get(2)?,
            direction: row.get(3)?,
            counterparty_ref: row.get(4)?,
            our_party_ref: row.get(5)?,
            schedule_json: row.get(6)?,
            transport_terms_json: row.get(7)?,
            transport_class: row.get(8)?,
            lines_json: row.get(9)?,
            notes: row.get(10)?,
            created_at: row.get(11)?,
            status: row.get(12)?,
        })
    }

    fn into_snapshot(self) -> RepositoryResult<OrderStagingSnapshot> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| RepositoryError::field("direction", self.direction.clone()))?;
        let status = SnapshotStatus::parse(&self.status)
            .ok_or_else(|| RepositoryError::field("status", self.status.clone()))?;
        let transport_class: TransportClass =
            serde_json::from_value(serde_json::Value::String(self.transport_class.clone()))
                .map_err(|_| RepositoryError::field("transport_class", self.transport_class.clone()))?;
        let schedule: ScheduleDescriptor = serde_json::from_str(&self.schedule_json)?;
        let transport_terms: TransportTerms = serde_json::from_str(&self.transport_terms_json)?;
        let lines: Vec<OrderLine> = serde_json::from_str(&self.lines_json)?;

        Ok(OrderStagingSnapshot::from_parts(SnapshotParts {
            snapshot_id: self.snapshot_id,
            draft_id: self.draft_id,
            deal_id: self.deal_id,
            direction,
            counterparty_ref: self.counterparty_ref,
            our_party_ref: self.our_party_ref,
            schedule,
            transport_terms,
            transport_class,
            lines,
            notes: SnapshotNotes::new(self.notes),
            created_at: parse_ts("created_at", &self.created_at)?,
            status,
        }))
    }
}

// ==========================================
// SqliteOrderStagingStore
// ==========================================
pub struct SqliteOrderStagingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderStagingStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn query_one(&self, filter: &str, key: &str) -> RepositoryResult<Option<OrderStagingSnapshot>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM order_staging WHERE {} = ?1", STAGING_COLUMNS, filter);
        let row = conn
            .query_row(&sql, params![key], StagingRow::from_row)
            .optional()?;
        row.map(StagingRow::into_snapshot).transpose()
    }
}

impl OrderStagingStore for SqliteOrderStagingStore {
    fn create(&self, snapshot: &OrderStagingSnapshot) -> RepositoryResult<()> {
        let schedule_json = serde_json::to_string(&snapshot.schedule())?;
        let terms_json = serde_json::to_string(&snapshot.transport_terms())?;
        let lines_json = serde_json::to_string(snapshot.lines())?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO order_staging (
                snapshot_id, draft_id, deal_id, direction, counterparty_ref, our_party_ref,
                schedule_json, transport_terms_json, transport_class, lines_json,
                notes, created_at, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                snapshot.snapshot_id(),
                snapshot.draft_id(),
                snapshot.deal_id(),
                snapshot.direction().as_str(),
                snapshot.counterparty_ref(),
                snapshot.our_party_ref(),
                schedule_json,
                terms_json,
                snapshot.transport_class().as_str(),
                lines_json,
                snapshot.notes().as_str(),
                snapshot.created_at().format(TS_FORMAT).to_string(),
                snapshot.status().as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_by_id(&self, snapshot_id: &str) -> RepositoryResult<Option<OrderStagingSnapshot>> {
        self.query_one("snapshot_id", snapshot_id)
    }

    fn find_by_draft_id(&self, draft_id: &str) -> RepositoryResult<Option<OrderStagingSnapshot>> {
        self.query_one("draft_id", draft_id)
    }

    fn update_notes(&self, snapshot_id: &str, notes: &SnapshotNotes) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE order_staging SET notes = ?1 WHERE snapshot_id = ?2",
            params![notes.as_str(), snapshot_id],
        )?;
        Ok(affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CadenceKind, WeekSlot};
    use chrono::NaiveDate;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn make_snapshot(snapshot_id: &str, draft_id: &str) -> OrderStagingSnapshot {
        OrderStagingSnapshot::from_parts(SnapshotParts {
            snapshot_id: snapshot_id.to_string(),
            draft_id: draft_id.to_string(),
            deal_id: Some("DEAL-1".to_string()),
            direction: Direction::Outbound,
            counterparty_ref: "ACME".to_string(),
            our_party_ref: "OBARI".to_string(),
            schedule: ScheduleDescriptor::Recurring {
                kind: CadenceKind::FourWeekly,
                week_slot: WeekSlot::W2,
            },
            transport_terms: TransportTerms {
                quoted_in_price: false,
                vendor_arranges: true,
            },
            transport_class: TransportClass::VendorArranged,
            lines: vec![OrderLine::new("SKU-1", 12.0, 3.5, "CTN")],
            notes: SnapshotNotes::new("initial"),
            created_at: NaiveDate::from_ymd_opt(2025, 11, 2)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            status: SnapshotStatus::Staging,
        })
    }

    #[test]
    fn test_create_and_get_by_id() {
        let store = SqliteOrderStagingStore::new(setup_test_db());
        let snapshot = make_snapshot("STG-000001", "D1");
        store.create(&snapshot).unwrap();

        assert_eq!(store.get_by_id("STG-000001").unwrap(), Some(snapshot.clone()));
        assert_eq!(store.find_by_draft_id("D1").unwrap(), Some(snapshot));
        assert!(store.get_by_id("STG-404").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_draft_rejected() {
        let store = SqliteOrderStagingStore::new(setup_test_db());
        store.create(&make_snapshot("STG-000001", "D1")).unwrap();
        let err = store.create(&make_snapshot("STG-000002", "D1")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_update_notes_touches_only_notes() {
        let store = SqliteOrderStagingStore::new(setup_test_db());
        let snapshot = make_snapshot("STG-000001", "D1");
        store.create(&snapshot).unwrap();

        assert!(store
            .update_notes("STG-000001", &SnapshotNotes::new("call before delivery"))
            .unwrap());
        assert!(!store
            .update_notes("STG-404", &SnapshotNotes::new("x"))
            .unwrap());

        let stored = store.get_by_id("STG-000001").unwrap().unwrap();
        assert_eq!(stored.notes().as_str(), "call before delivery");
        assert_eq!(stored.with_notes(SnapshotNotes::new("initial")), snapshot);
    }

    #[test]
    fn test_locked_columns_rejected_by_trigger() {
        let conn = setup_test_db();
        let store = SqliteOrderStagingStore::new(conn.clone());
        store.create(&make_snapshot("STG-000001", "D1")).unwrap();

        let guard = conn.lock().unwrap();
        let result = guard.execute(
            "UPDATE order_staging SET lines_json = '[]' WHERE snapshot_id = 'STG-000001'",
            [],
        );
        assert!(result.is_err());
        drop(guard);

        let stored = store.get_by_id("STG-000001").unwrap().unwrap();
        assert_eq!(stored.lines().len(), 1);
    }
}

// ==========================================
// OBARI 生命周期引擎 - 库存流水仓储
// ==========================================
// 职责: 记录 IN/OUT 流水, 提供在库量与滑动窗口消耗量
// 口径: 在库量 = Σ IN − Σ OUT
// ==========================================

use crate::domain::replenishment::StockMovement;
use crate::domain::types::StockDirection;
use crate::repository::error::{parse_ts, RepositoryError, RepositoryResult, TS_FORMAT};
use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// StockLevelReader Trait
// ==========================================
// 用途: 补货观察者所需的库存读取接口
pub trait StockLevelReader: Send + Sync {
    /// 当前在库量
    fn on_hand(&self, item_id: &str) -> RepositoryResult<f64>;

    /// [as_of - window_days, as_of] 内的 OUT 方向合计
    fn trailing_consumption(
        &self,
        item_id: &str,
        window_days: i64,
        as_of: NaiveDateTime,
    ) -> RepositoryResult<f64>;
}

pub struct StockLedgerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockLedgerRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 记录一条库存流水
    pub fn record(&self, movement: &StockMovement) -> RepositoryResult<()> {
        if !movement.quantity.is_finite() || movement.quantity < 0.0 {
            return Err(RepositoryError::field(
                "quantity",
                format!("数量必须为非负有限值: {}", movement.quantity),
            ));
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO stock_movement (movement_id, item_id, direction, quantity, moved_at, reference)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                movement.movement_id,
                movement.item_id,
                movement.direction.as_str(),
                movement.quantity,
                movement.moved_at.format(TS_FORMAT).to_string(),
                movement.reference,
            ],
        )?;
        Ok(())
    }

    /// 按时间顺序列出某物料的流水
    pub fn list_by_item(&self, item_id: &str) -> RepositoryResult<Vec<StockMovement>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT movement_id, item_id, direction, quantity, moved_at, reference
            FROM stock_movement
            WHERE item_id = ?1
            ORDER BY moved_at ASC, rowid ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![item_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(movement_id, item_id, direction, quantity, moved_at, reference)| {
                Ok(StockMovement {
                    movement_id,
                    item_id,
                    direction: StockDirection::parse(&direction)
                        .ok_or_else(|| RepositoryError::field("direction", direction.clone()))?,
                    quantity,
                    moved_at: parse_ts("moved_at", &moved_at)?,
                    reference,
                })
            })
            .collect()
    }
}

impl StockLevelReader for StockLedgerRepository {
    fn on_hand(&self, item_id: &str) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let on_hand: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'IN' THEN quantity ELSE -quantity END), 0.0)
            FROM stock_movement
            WHERE item_id = ?1
            "#,
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(on_hand)
    }

    fn trailing_consumption(
        &self,
        item_id: &str,
        window_days: i64,
        as_of: NaiveDateTime,
    ) -> RepositoryResult<f64> {
        // 窗口区间 (as_of - window_days, as_of]
        let start = Duration::try_days(window_days.max(0))
            .and_then(|window| as_of.checked_sub_signed(window))
            .ok_or_else(|| RepositoryError::field("trailing_window_days", window_days.to_string()))?;
        let conn = self.get_conn()?;
        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity), 0.0)
            FROM stock_movement
            WHERE item_id = ?1
              AND direction = 'OUT'
              AND moved_at > ?2
              AND moved_at <= ?3
            "#,
            params![
                item_id,
                start.format(TS_FORMAT).to_string(),
                as_of.format(TS_FORMAT).to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn movement(id: &str, direction: StockDirection, qty: f64, at: NaiveDateTime) -> StockMovement {
        StockMovement {
            movement_id: id.to_string(),
            item_id: "SKU-1".to_string(),
            direction,
            quantity: qty,
            moved_at: at,
            reference: None,
        }
    }

    #[test]
    fn test_on_hand_nets_in_and_out() {
        let repo = StockLedgerRepository::new(setup_test_db());
        assert_eq!(repo.on_hand("SKU-1").unwrap(), 0.0);

        repo.record(&movement("m1", StockDirection::In, 50.0, day(1))).unwrap();
        repo.record(&movement("m2", StockDirection::Out, 18.0, day(2))).unwrap();
        assert_eq!(repo.on_hand("SKU-1").unwrap(), 32.0);
        assert_eq!(repo.list_by_item("SKU-1").unwrap().len(), 2);
    }

    #[test]
    fn test_trailing_consumption_window() {
        let repo = StockLedgerRepository::new(setup_test_db());
        let as_of = NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        // 2025-11-02 12:00 距 as_of 29 天, 不计入
        repo.record(&movement("old", StockDirection::Out, 100.0, day(2))).unwrap();
        repo.record(&movement("m1", StockDirection::Out, 15.0, day(10))).unwrap();
        repo.record(&movement("m2", StockDirection::Out, 25.0, day(28))).unwrap();
        repo.record(&movement("in", StockDirection::In, 70.0, day(20))).unwrap();

        assert_eq!(repo.trailing_consumption("SKU-1", 28, as_of).unwrap(), 40.0);
        assert_eq!(repo.trailing_consumption("SKU-2", 28, as_of).unwrap(), 0.0);
    }

    #[test]
    fn test_trailing_window_excludes_start_instant() {
        let repo = StockLedgerRepository::new(setup_test_db());
        let as_of = day(29);

        // 恰好 as_of - 28 天: 在窗口外; as_of 本身: 在窗口内
        repo.record(&movement("edge", StockDirection::Out, 9.0, day(1))).unwrap();
        repo.record(&movement("now", StockDirection::Out, 4.0, as_of)).unwrap();
        assert_eq!(repo.trailing_consumption("SKU-1", 28, as_of).unwrap(), 4.0);
        assert_eq!(repo.trailing_consumption("SKU-1", 29, as_of).unwrap(), 13.0);
    }

    #[test]
    fn test_oversized_window_is_an_error() {
        let repo = StockLedgerRepository::new(setup_test_db());
        let err = repo
            .trailing_consumption("SKU-1", i64::MAX, day(1))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));

        // 连接未被毒化
        assert_eq!(repo.on_hand("SKU-1").unwrap(), 0.0);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let repo = StockLedgerRepository::new(setup_test_db());
        let err = repo
            .record(&movement("bad", StockDirection::Out, -1.0, day(1)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));
    }
}

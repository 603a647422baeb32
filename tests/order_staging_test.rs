// ==========================================
// 订单暂存快照集成测试
// ==========================================
// 职责: 锁定、不可变性 (含库级触发器)、备注修改、运输分类、编号序列
// ==========================================

mod helpers;

use helpers::test_data_builder::DraftBuilder;
use obari_lifecycle::domain::staging::{ScheduleDescriptor, SnapshotNotes};
use obari_lifecycle::domain::types::{CadenceKind, SnapshotStatus, TransportClass, WeekSlot};
use obari_lifecycle::engine::staging::{OrderStagingService, StagingError};
use obari_lifecycle::repository::{SqliteNumberSeries, SqliteOrderStagingStore};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use test_helpers::{create_test_db, date, open_shared_conn, ts};

struct Env {
    _tmp: NamedTempFile,
    conn: Arc<Mutex<Connection>>,
    service: OrderStagingService,
    series: SqliteNumberSeries,
}

fn setup() -> Env {
    let (tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_conn(&db_path);
    Env {
        _tmp: tmp,
        service: OrderStagingService::new(Arc::new(SqliteOrderStagingStore::new(conn.clone()))),
        series: SqliteNumberSeries::new(conn.clone()),
        conn,
    }
}

#[test]
fn test_lock_freezes_draft_and_numbers_sequentially() {
    let env = setup();
    let first = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("D-1").line("SKU-1", 10.0, 2.0).build(),
            &env.series,
            ts(2025, 11, 12, 9),
        )
        .unwrap();
    let second = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("D-2").line("SKU-2", 4.0, 1.5).build(),
            &env.series,
            ts(2025, 11, 12, 9),
        )
        .unwrap();

    assert_eq!(first.snapshot_id(), "STG-000001");
    assert_eq!(second.snapshot_id(), "STG-000002");
    assert_eq!(first.status(), SnapshotStatus::Staging);
    assert_eq!(first.schedule(), ScheduleDescriptor::AdHoc { date: None });
    assert!((first.total_amount() - 20.0).abs() < 1e-9);
}

#[test]
fn test_same_draft_cannot_lock_twice() {
    let env = setup();
    let draft = DraftBuilder::new("D-1").line("SKU-1", 10.0, 2.0).build();
    let snapshot = env
        .service
        .lock_from_draft(&draft, &env.series, ts(2025, 11, 12, 9))
        .unwrap();

    match env.service.lock_from_draft(&draft, &env.series, ts(2025, 11, 12, 10)) {
        Err(StagingError::AlreadyLocked { snapshot_id, draft_id }) => {
            assert_eq!(snapshot_id, snapshot.snapshot_id());
            assert_eq!(draft_id, "D-1");
        }
        other => panic!("expected AlreadyLocked, got {:?}", other),
    }
}

#[test]
fn test_invalid_drafts_are_rejected() {
    let env = setup();
    let cases = vec![
        DraftBuilder::new("D-EMPTY").build(),
        DraftBuilder::new("D-QTY").line("SKU-1", 0.0, 2.0).build(),
        DraftBuilder::new("D-PRICE").line("SKU-1", 1.0, -1.0).build(),
        DraftBuilder::new("D-SKU").line("  ", 1.0, 1.0).build(),
        DraftBuilder::new("D-CP").counterparty("").line("SKU-1", 1.0, 1.0).build(),
    ];
    for draft in cases {
        let result = env.service.lock_from_draft(&draft, &env.series, ts(2025, 11, 12, 9));
        assert!(
            matches!(result, Err(StagingError::InvalidDraft { .. })),
            "{} 应被拒绝: {:?}",
            draft.draft_id,
            result
        );
    }
}

#[test]
fn test_replenishment_price_zero_is_allowed() {
    let env = setup();
    let snapshot = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("RPL-1").line("SKU-1", 12.0, 0.0).build(),
            &env.series,
            ts(2025, 11, 12, 9),
        )
        .unwrap();
    assert_eq!(snapshot.total_amount(), 0.0);
}

#[test]
fn test_transport_classification_precedence() {
    let env = setup();
    let cases = [
        ("T-1", true, true, TransportClass::QuotedIn),
        ("T-2", true, false, TransportClass::QuotedIn),
        ("T-3", false, true, TransportClass::VendorArranged),
        ("T-4", false, false, TransportClass::ClientArranged),
    ];
    for (id, quoted, vendor, expected) in cases {
        let snapshot = env
            .service
            .lock_from_draft(
                &DraftBuilder::new(id)
                    .line("SKU-1", 1.0, 1.0)
                    .transport(quoted, vendor)
                    .build(),
                &env.series,
                ts(2025, 11, 12, 9),
            )
            .unwrap();
        assert_eq!(snapshot.transport_class(), expected, "{}", id);
        assert_eq!(env.service.transport_flag(snapshot.snapshot_id()).unwrap(), expected);
    }
}

#[test]
fn test_recurring_slot_derived_from_execution_date() {
    let env = setup();
    let derived = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("R-1")
                .line("SKU-1", 1.0, 1.0)
                .recurring(CadenceKind::FourWeekly, None)
                .execution_date(date(2025, 11, 20))
                .build(),
            &env.series,
            ts(2025, 11, 3, 9),
        )
        .unwrap();
    assert_eq!(derived.schedule().week_slot(), Some(WeekSlot::W3));

    let explicit = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("R-2")
                .line("SKU-1", 1.0, 1.0)
                .recurring(CadenceKind::Weekly, Some(WeekSlot::W4))
                .build(),
            &env.series,
            ts(2025, 11, 3, 9),
        )
        .unwrap();
    assert_eq!(explicit.schedule().week_slot(), Some(WeekSlot::W4));
}

#[test]
fn test_notes_patch_changes_only_notes() {
    let env = setup();
    let before = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("D-1").line("SKU-1", 10.0, 2.0).notes("first").build(),
            &env.series,
            ts(2025, 11, 12, 9),
        )
        .unwrap();

    let after = env
        .service
        .patch_notes_only(before.snapshot_id(), SnapshotNotes::new("gate B only"))
        .unwrap();
    assert_eq!(after.notes().as_str(), "gate B only");
    assert_eq!(after.lines(), before.lines());
    assert_eq!(after.transport_class(), before.transport_class());
    assert_eq!(after.created_at(), before.created_at());

    assert!(matches!(
        env.service.patch_notes_only("STG-999999", SnapshotNotes::new("x")),
        Err(StagingError::NotFound { .. })
    ));
}

#[test]
fn test_database_rejects_locked_field_updates() {
    let env = setup();
    let snapshot = env
        .service
        .lock_from_draft(
            &DraftBuilder::new("D-1").line("SKU-1", 10.0, 2.0).build(),
            &env.series,
            ts(2025, 11, 12, 9),
        )
        .unwrap();

    let conn = env.conn.lock().unwrap();
    let result = conn.execute(
        "UPDATE order_staging SET lines_json = '[]' WHERE snapshot_id = ?1",
        params![snapshot.snapshot_id()],
    );
    assert!(result.is_err());

    let result = conn.execute(
        "UPDATE order_staging SET transport_class = 'QUOTED_IN' WHERE snapshot_id = ?1",
        params![snapshot.snapshot_id()],
    );
    assert!(result.is_err());

    // notes 列允许
    let affected = conn
        .execute(
            "UPDATE order_staging SET notes = 'ok' WHERE snapshot_id = ?1",
            params![snapshot.snapshot_id()],
        )
        .unwrap();
    assert_eq!(affected, 1);
}

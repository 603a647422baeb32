// ==========================================
// 补货流程集成测试
// ==========================================
// 职责: 库存流水 → 补货观察 → 计划意图 → 回灌入库交易
// 场景: 默认阈值、配置覆盖、同一物料并发串行
// ==========================================

mod helpers;

use helpers::mock_config::MockConfig;
use obari_lifecycle::app::AppState;
use obari_lifecycle::config::config_keys;
use obari_lifecycle::domain::replenishment::{
    ReplenishmentOutcome, StockConsumptionEvent, UNASSIGNED_SUPPLIER,
};
use obari_lifecycle::domain::types::{DealStatus, Direction, StockDirection, WeekSlot};
use obari_lifecycle::engine::coordinator::ReplenishmentCoordinator;
use obari_lifecycle::engine::lifecycle::DealLifecycleService;
use obari_lifecycle::engine::replenishment::ReplenishmentObserver;
use obari_lifecycle::engine::repositories::LifecycleRepositories;
use obari_lifecycle::repository::{PlanningIntentRepository, StockLedgerRepository};
use std::sync::Arc;
use std::thread;
use tempfile::NamedTempFile;
use test_helpers::{create_test_db, open_shared_conn, ts};

// ==========================================
// 测试辅助函数
// ==========================================

fn app_state() -> (NamedTempFile, AppState) {
    let (tmp, db_path) = create_test_db().unwrap();
    (tmp, AppState::new(db_path).unwrap())
}

/// 固定时钟的协调器 (Mock 配置)
fn coordinator(config: MockConfig) -> (NamedTempFile, ReplenishmentCoordinator, Arc<PlanningIntentRepository>) {
    let (tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_conn(&db_path);
    let ledger = Arc::new(StockLedgerRepository::new(conn.clone()));
    let planning = Arc::new(PlanningIntentRepository::new(conn.clone()));
    let observer = Arc::new(ReplenishmentObserver::new(
        ledger.clone(),
        planning.clone(),
        Arc::new(config),
    ));
    let lifecycle = Arc::new(DealLifecycleService::new(LifecycleRepositories::sqlite(conn)));
    (
        tmp,
        ReplenishmentCoordinator::new(observer, lifecycle, ledger),
        planning,
    )
}

fn inbound(item_id: &str, quantity: f64) -> StockConsumptionEvent {
    StockConsumptionEvent {
        item_id: item_id.to_string(),
        quantity,
        direction: StockDirection::In,
    }
}

// ==========================================
// 测试用例
// ==========================================

#[test]
fn test_forty_out_in_window_reorders_twelve_for_next_slot() {
    let (_tmp, coordinator, planning) = coordinator(MockConfig::default());

    coordinator
        .record_and_observe(&inbound("SKU-A", 48.0), Some("GRN-1"), ts(2025, 10, 20, 8))
        .unwrap();
    for (day, qty) in [(21, 10.0), (28, 10.0), (4, 10.0)] {
        let month = if day > 10 { 10 } else { 11 };
        let result = coordinator
            .record_and_observe(
                &StockConsumptionEvent::outbound("SKU-A", qty),
                None,
                ts(2025, month, day, 9),
            )
            .unwrap();
        assert!(result.issued.is_none());
    }

    // 第 4 笔出库后在库 8 ≤ 10, 窗口 (28 天) 出库合计 40
    let result = coordinator
        .record_and_observe(
            &StockConsumptionEvent::outbound("SKU-A", 10.0),
            Some("SO-4"),
            ts(2025, 11, 12, 10),
        )
        .unwrap();
    let intent = result.outcome.intent().unwrap().clone();
    assert!((intent.reorder_qty - 12.0).abs() < 1e-9);
    assert_eq!(intent.week_slot, WeekSlot::W3);
    assert_eq!(intent.unit_price, 0.0);

    let issued = result.issued.unwrap();
    assert_eq!(issued.deal.status, DealStatus::Lead);
    assert_eq!(issued.deal.direction, Direction::Inbound);
    assert_eq!(issued.deal.counterparty_ref, UNASSIGNED_SUPPLIER);
    assert_eq!(issued.draft.lines[0].sku, "SKU-A");
    assert_eq!(issued.draft.lines[0].unit_price, 0.0);

    let recorded = planning.list_by_item("SKU-A").unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].status, "PENDING_PRICE");
    assert_eq!(recorded[0].week_slot, WeekSlot::W3);
}

#[test]
fn test_events_outside_window_are_not_counted() {
    let (_tmp, coordinator, _) = coordinator(MockConfig::default());

    // 窗口外的大额出库只影响在库量, 不影响补货量
    coordinator
        .record_and_observe(&inbound("SKU-A", 200.0), None, ts(2025, 9, 1, 8))
        .unwrap();
    coordinator
        .record_and_observe(&StockConsumptionEvent::outbound("SKU-A", 195.0), None, ts(2025, 9, 2, 8))
        .unwrap();

    let result = coordinator
        .record_and_observe(&StockConsumptionEvent::outbound("SKU-A", 1.0), None, ts(2025, 11, 12, 8))
        .unwrap();
    // 窗口内仅 1 → 1/4×1.2 = 0.3 → 最小补货量 5
    assert_eq!(result.outcome.intent().unwrap().reorder_qty, 5.0);
}

#[test]
fn test_item_override_and_safety_factor() {
    let config = MockConfig::default()
        .with_item_reorder_point("SKU-BULK", 100.0)
        .with_safety_factor(2.0);
    let (_tmp, coordinator, _) = coordinator(config);

    coordinator
        .record_and_observe(&inbound("SKU-BULK", 150.0), None, ts(2025, 11, 10, 8))
        .unwrap();
    let result = coordinator
        .record_and_observe(&StockConsumptionEvent::outbound("SKU-BULK", 60.0), None, ts(2025, 11, 12, 8))
        .unwrap();
    // 在库 90 ≤ 100; 60/4×2 = 30
    assert_eq!(result.outcome.intent().unwrap().reorder_qty, 30.0);

    // 其他物料仍用全局再订货点
    coordinator
        .record_and_observe(&inbound("SKU-SMALL", 150.0), None, ts(2025, 11, 10, 8))
        .unwrap();
    let result = coordinator
        .record_and_observe(&StockConsumptionEvent::outbound("SKU-SMALL", 60.0), None, ts(2025, 11, 12, 8))
        .unwrap();
    assert!(matches!(
        result.outcome,
        ReplenishmentOutcome::AboveReorderPoint { on_hand, reorder_point } if on_hand == 90.0 && reorder_point == 10.0
    ));
}

#[test]
fn test_stock_api_uses_configured_thresholds() {
    let (_tmp, state) = app_state();
    state
        .config_manager
        .set_global_config_value(&config_keys::item_reorder_point("SKU-C"), "40")
        .unwrap();

    state.stock_api.record_movement("SKU-C", 50.0, "IN", Some("GRN-9")).unwrap();
    let result = state.stock_api.record_movement("SKU-C", 20.0, "OUT", Some("SO-9")).unwrap();

    let issued = result.issued.expect("在库 30 ≤ 40 应触发补货");
    assert_eq!(state.stock_api.on_hand("SKU-C").unwrap(), 30.0);
    assert_eq!(state.stock_api.planning_intents("SKU-C").unwrap().len(), 1);

    let history = state.deal_api.history(&issued.deal.deal_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_type, "ReplenishmentIssued");
    assert!(history[0].payload_json.is_some());
}

#[test]
fn test_stock_api_validates_input() {
    let (_tmp, state) = app_state();
    assert!(state.stock_api.record_movement("", 1.0, "OUT", None).is_err());
    assert!(state.stock_api.record_movement("SKU-1", -1.0, "OUT", None).is_err());
    assert!(state.stock_api.record_movement("SKU-1", 1.0, "SIDEWAYS", None).is_err());
    assert!(state.stock_api.cadence_window("2025-13-01").is_err());
    assert_eq!(
        state.stock_api.cadence_window("2025-11-12").unwrap().label,
        "2025-W46/W2"
    );
}

#[test]
fn test_concurrent_consumption_of_one_item_is_serialized() {
    let (_tmp, state) = app_state();
    let stock_api = state.stock_api.clone();
    stock_api.record_movement("SKU-HOT", 100.0, "IN", None).unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let api = stock_api.clone();
            thread::spawn(move || api.record_movement("SKU-HOT", 10.0, "OUT", None).unwrap())
        })
        .collect();
    let triggered = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.issued.is_some())
        .count();

    // 串行观察到的在库量依次为 90..0, 只有 10 与 0 两次触发
    assert_eq!(triggered, 2);
    assert_eq!(stock_api.on_hand("SKU-HOT").unwrap(), 0.0);
    assert_eq!(stock_api.planning_intents("SKU-HOT").unwrap().len(), 2);
}

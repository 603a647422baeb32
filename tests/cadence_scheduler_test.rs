// ==========================================
// 周期排程测试
// ==========================================
// 职责: 月锚点、槽位推算、7 天窗口与标签
// ==========================================


use chrono::{Datelike, Duration, Weekday};
use obari_lifecycle::domain::types::WeekSlot;
use obari_lifecycle::engine::cadence::CadenceScheduler;
use test_helpers::date;

#[test]
fn test_anchor_is_first_sunday_on_or_after_first() {
    let cs = CadenceScheduler::new();
    for year in [2024, 2025, 2026] {
        for month in 1..=12 {
            let anchor = cs.month_anchor(year, month).unwrap();
            assert_eq!(anchor.weekday(), Weekday::Sun);
            assert_eq!(anchor.month(), month);
            assert!(anchor.day() <= 7, "{}-{} 锚点 {}", year, month, anchor);
        }
    }
    assert_eq!(cs.month_anchor(2025, 13), None);
}

#[test]
fn test_month_starting_on_sunday_anchors_on_first() {
    let cs = CadenceScheduler::new();
    // 2025-06-01 为周日
    assert_eq!(cs.month_anchor(2025, 6), Some(date(2025, 6, 1)));
    assert_eq!(cs.week_slot_for(date(2025, 6, 1)), WeekSlot::W1);
    assert_eq!(cs.week_slot_for(date(2025, 6, 8)), WeekSlot::W2);
}

#[test]
fn test_slot_is_constant_within_a_window() {
    let cs = CadenceScheduler::new();
    // 从锚点开始: 锚点之前的日期所在窗口起于上月
    let mut day = date(2025, 11, 2);
    while day.month() == 11 {
        let window = cs.window_for(day);
        assert!(window.contains(day));
        assert_eq!(window.start.weekday(), Weekday::Sun);
        assert_eq!(window.end - window.start, Duration::days(7));
        assert_eq!(cs.week_slot_for(window.start), window.week_slot);
        day += Duration::days(1);
    }
}

#[test]
fn test_november_2025_slots() {
    let cs = CadenceScheduler::new();
    assert_eq!(cs.week_slot_for(date(2025, 11, 1)), WeekSlot::W1);
    assert_eq!(cs.week_slot_for(date(2025, 11, 12)), WeekSlot::W2);
    assert_eq!(cs.next_week_slot(date(2025, 11, 12)), WeekSlot::W3);
    assert_eq!(cs.week_slot_for(date(2025, 11, 29)), WeekSlot::W4);
    // 第五个周日回绕
    assert_eq!(cs.week_slot_for(date(2025, 11, 30)), WeekSlot::W1);
}

#[test]
fn test_window_label_uses_iso_week_of_monday() {
    let cs = CadenceScheduler::new();
    let window = cs.window_for(date(2025, 11, 12));
    assert_eq!(window.start, date(2025, 11, 9));
    assert_eq!(window.end, date(2025, 11, 16));
    assert_eq!(window.label, "2025-W46/W2");

    // 跨年: 2025-12-28 周日, 周一 2025-12-29 属于 2026-W01
    let year_end = cs.window_for(date(2025, 12, 31));
    assert_eq!(year_end.start, date(2025, 12, 28));
    assert!(year_end.label.starts_with("2026-W01/"));
}

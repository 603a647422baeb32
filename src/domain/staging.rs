// ==========================================
// OBARI 生命周期引擎 - 订单暂存快照领域模型
// ==========================================
// 职责: 订单草稿 (可变输入) 与暂存快照 (冻结结果)
// 红线: 快照除 notes 外全部字段不可变
//       - 字段私有, 只提供只读访问
//       - 唯一的变更入口只接受 SnapshotNotes
// ==========================================

use crate::domain::types::{CadenceKind, Direction, SnapshotStatus, TransportClass, WeekSlot};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// OrderLine - 订单行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: f64,
    pub unit_price: f64, // 0 表示待定价 (补货单)
    pub uom: String,     // 计量单位
}

impl OrderLine {
    pub fn new(sku: &str, quantity: f64, unit_price: f64, uom: &str) -> Self {
        Self {
            sku: sku.to_string(),
            quantity,
            unit_price,
            uom: uom.to_string(),
        }
    }
}

// ==========================================
// TransportTerms - 运输条款 (草稿原始字段)
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportTerms {
    pub quoted_in_price: bool, // 运费已计入报价
    pub vendor_arranges: bool, // 供方负责安排运输
}

impl TransportTerms {
    /// 派生运输分类 (全函数, 无歧义分支)
    ///
    /// 优先级: 计入报价 > 供方安排 > 客户安排
    pub fn classify(&self) -> TransportClass {
        if self.quoted_in_price {
            TransportClass::QuotedIn
        } else if self.vendor_arranges {
            TransportClass::VendorArranged
        } else {
            TransportClass::ClientArranged
        }
    }
}

// ==========================================
// ScheduleDescriptor - 执行排程描述
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleDescriptor {
    Recurring { kind: CadenceKind, week_slot: WeekSlot },
    AdHoc { date: Option<NaiveDate> },
}

impl ScheduleDescriptor {
    pub fn week_slot(&self) -> Option<WeekSlot> {
        match self {
            ScheduleDescriptor::Recurring { week_slot, .. } => Some(*week_slot),
            ScheduleDescriptor::AdHoc { .. } => None,
        }
    }
}

// ==========================================
// OrderDraft - 订单草稿 (可变)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub draft_id: String,
    pub deal_id: Option<String>,
    pub direction: Direction,
    pub counterparty_ref: String,
    pub our_party_ref: String,
    pub lines: Vec<OrderLine>,
    pub transport: TransportTerms,
    pub cadence: Option<CadenceKind>,     // None → 临时单
    pub week_slot: Option<WeekSlot>,      // 指定槽位; None 时按执行日期推算
    pub execution_date: Option<NaiveDate>,
    pub notes: String,
}

impl OrderDraft {
    pub fn new(draft_id: &str, direction: Direction, counterparty_ref: &str, our_party_ref: &str) -> Self {
        Self {
            draft_id: draft_id.to_string(),
            deal_id: None,
            direction,
            counterparty_ref: counterparty_ref.to_string(),
            our_party_ref: our_party_ref.to_string(),
            lines: Vec::new(),
            transport: TransportTerms::default(),
            cadence: None,
            week_slot: None,
            execution_date: None,
            notes: String::new(),
        }
    }
}

// ==========================================
// SnapshotNotes - 备注 (唯一可修改字段)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotNotes(String);

impl SnapshotNotes {
    pub fn new(notes: impl Into<String>) -> Self {
        Self(notes.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ==========================================
// OrderStagingSnapshot - 订单暂存快照 (冻结)
// ==========================================
// 对齐: order_staging 表
// 只能由暂存服务/仓储在 crate 内部构造
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStagingSnapshot {
    snapshot_id: String,
    draft_id: String,
    deal_id: Option<String>,
    direction: Direction,
    counterparty_ref: String,
    our_party_ref: String,
    schedule: ScheduleDescriptor,
    transport_terms: TransportTerms,
    transport_class: TransportClass,
    lines: Vec<OrderLine>,
    notes: SnapshotNotes,
    created_at: NaiveDateTime,
    status: SnapshotStatus,
}

/// 快照构造参数 (crate 内部使用)
pub(crate) struct SnapshotParts {
    pub snapshot_id: String,
    pub draft_id: String,
    pub deal_id: Option<String>,
    pub direction: Direction,
    pub counterparty_ref: String,
    pub our_party_ref: String,
    pub schedule: ScheduleDescriptor,
    pub transport_terms: TransportTerms,
    pub transport_class: TransportClass,
    pub lines: Vec<OrderLine>,
    pub notes: SnapshotNotes,
    pub created_at: NaiveDateTime,
    pub status: SnapshotStatus,
}

impl OrderStagingSnapshot {
    pub(crate) fn from_parts(parts: SnapshotParts) -> Self {
        Self {
            snapshot_id: parts.snapshot_id,
            draft_id: parts.draft_id,
            deal_id: parts.deal_id,
            direction: parts.direction,
            counterparty_ref: parts.counterparty_ref,
            our_party_ref: parts.our_party_ref,
            schedule: parts.schedule,
            transport_terms: parts.transport_terms,
            transport_class: parts.transport_class,
            lines: parts.lines,
            notes: parts.notes,
            created_at: parts.created_at,
            status: parts.status,
        }
    }

    /// 生成仅 notes 不同的新值
    pub(crate) fn with_notes(&self, notes: SnapshotNotes) -> Self {
        Self {
            notes,
            ..self.clone()
        }
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    pub fn deal_id(&self) -> Option<&str> {
        self.deal_id.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn counterparty_ref(&self) -> &str {
        &self.counterparty_ref
    }

    pub fn our_party_ref(&self) -> &str {
        &self.our_party_ref
    }

    pub fn schedule(&self) -> ScheduleDescriptor {
        self.schedule
    }

    pub fn transport_terms(&self) -> TransportTerms {
        self.transport_terms
    }

    pub fn transport_class(&self) -> TransportClass {
        self.transport_class
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn notes(&self) -> &SnapshotNotes {
        &self.notes
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    /// 订单总额 (数量 × 单价)
    pub fn total_amount(&self) -> f64 {
        self.lines.iter().map(|l| l.quantity * l.unit_price).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification_is_total() {
        let cases = [
            (true, true, TransportClass::QuotedIn),
            (true, false, TransportClass::QuotedIn),
            (false, true, TransportClass::VendorArranged),
            (false, false, TransportClass::ClientArranged),
        ];
        for (quoted, vendor, expected) in cases {
            let terms = TransportTerms {
                quoted_in_price: quoted,
                vendor_arranges: vendor,
            };
            assert_eq!(terms.classify(), expected);
        }
    }

    #[test]
    fn test_with_notes_changes_only_notes() {
        let snapshot = OrderStagingSnapshot::from_parts(SnapshotParts {
            snapshot_id: "STG-000001".to_string(),
            draft_id: "D1".to_string(),
            deal_id: None,
            direction: Direction::Outbound,
            counterparty_ref: "ACME".to_string(),
            our_party_ref: "OBARI".to_string(),
            schedule: ScheduleDescriptor::AdHoc { date: None },
            transport_terms: TransportTerms::default(),
            transport_class: TransportClass::ClientArranged,
            lines: vec![OrderLine::new("SKU-1", 10.0, 2.5, "KG")],
            notes: SnapshotNotes::new("first"),
            created_at: NaiveDate::from_ymd_opt(2025, 11, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            status: SnapshotStatus::Staging,
        });

        let patched = snapshot.with_notes(SnapshotNotes::new("second"));
        assert_eq!(patched.notes().as_str(), "second");
        assert_eq!(patched.with_notes(SnapshotNotes::new("first")), snapshot);
        assert_eq!(snapshot.total_amount(), 25.0);
    }
}

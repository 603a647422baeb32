// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use chrono::NaiveDate;
use obari_lifecycle::domain::deal::DealFacts;
use obari_lifecycle::domain::staging::{OrderDraft, OrderLine, TransportTerms};
use obari_lifecycle::domain::types::{CadenceKind, DealStatus, Direction, WeekSlot};
use serde_json::{json, Value as JsonValue};

// ==========================================
// OrderDraft 构建器
// ==========================================

pub struct DraftBuilder {
    draft: OrderDraft,
}

impl DraftBuilder {
    pub fn new(draft_id: &str) -> Self {
        Self {
            draft: OrderDraft::new(draft_id, Direction::Outbound, "ACME", "OBARI"),
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.draft.direction = direction;
        self
    }

    pub fn counterparty(mut self, counterparty_ref: &str) -> Self {
        self.draft.counterparty_ref = counterparty_ref.to_string();
        self
    }

    pub fn deal(mut self, deal_id: &str) -> Self {
        self.draft.deal_id = Some(deal_id.to_string());
        self
    }

    pub fn line(mut self, sku: &str, quantity: f64, unit_price: f64) -> Self {
        self.draft.lines.push(OrderLine::new(sku, quantity, unit_price, "CTN"));
        self
    }

    pub fn transport(mut self, quoted_in_price: bool, vendor_arranges: bool) -> Self {
        self.draft.transport = TransportTerms {
            quoted_in_price,
            vendor_arranges,
        };
        self
    }

    pub fn recurring(mut self, kind: CadenceKind, week_slot: Option<WeekSlot>) -> Self {
        self.draft.cadence = Some(kind);
        self.draft.week_slot = week_slot;
        self
    }

    pub fn execution_date(mut self, date: NaiveDate) -> Self {
        self.draft.execution_date = Some(date);
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.draft.notes = notes.to_string();
        self
    }

    pub fn build(self) -> OrderDraft {
        self.draft
    }
}

// ==========================================
// 闸门事实
// ==========================================

/// 满足指定目标闸门的最小事实 (JSON 形式, 与表单提交一致)
pub fn gate_facts_json(target: DealStatus) -> JsonValue {
    match target {
        DealStatus::QuoteAccepted => json!({ "quoteId": "Q-100", "priceLocked": true, "confirmed": true }),
        DealStatus::AgreementInPrinciple => json!({
            "contractRef": "C-100",
            "agreementWindow": { "start": "2025-11-01", "end": "2026-10-31" },
            "scopeSummary": "weekly carton supply"
        }),
        DealStatus::OrderCommitted => {
            json!({ "poNumber": "PO-100", "soNumber": "SO-100", "bookingSheetRef": "BS-100" })
        }
        DealStatus::Documented => json!({
            "documents": [{ "docId": "DOC-1", "name": "signed PO", "verified": true }]
        }),
        DealStatus::Reported => json!({ "reportRef": "RPT-100" }),
        DealStatus::Invoiced => json!({ "invoiceNumber": "INV-100" }),
        DealStatus::Cancelled => json!({ "cancellationReason": "client withdrew" }),
        _ => json!({}),
    }
}

pub fn gate_facts(target: DealStatus) -> DealFacts {
    DealFacts::from_json(&gate_facts_json(target)).unwrap()
}

/// 正向主链 (不含起点 LEAD)
pub const FORWARD_CHAIN: [DealStatus; 8] = [
    DealStatus::QuoteAccepted,
    DealStatus::AgreementInPrinciple,
    DealStatus::OrderCommitted,
    DealStatus::Documented,
    DealStatus::Active,
    DealStatus::Reported,
    DealStatus::Invoiced,
    DealStatus::Closed,
];

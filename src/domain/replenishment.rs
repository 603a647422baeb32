// ==========================================
// OBARI 生命周期引擎 - 补货领域模型
// ==========================================
// 职责: 消耗事件、补货信号、新订单意图、计划意图记录
// 说明: 观察者只产出意图值, 由编排层送回交易流水线
// ==========================================

use crate::domain::staging::{OrderDraft, OrderLine};
use crate::domain::types::{CadenceKind, Direction, StockDirection, WeekSlot};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// StockConsumptionEvent - 库存消耗事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockConsumptionEvent {
    pub item_id: String,
    pub quantity: f64,
    pub direction: StockDirection,
}

impl StockConsumptionEvent {
    pub fn outbound(item_id: &str, quantity: f64) -> Self {
        Self {
            item_id: item_id.to_string(),
            quantity,
            direction: StockDirection::Out,
        }
    }
}

// ==========================================
// StockMovement - 库存流水
// ==========================================
// 对齐: stock_movement 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_id: String,
    pub item_id: String,
    pub direction: StockDirection,
    pub quantity: f64,
    pub moved_at: NaiveDateTime,
    pub reference: Option<String>, // 关联单号
}

// ==========================================
// ReplenishmentSignal - 补货信号 (临时值)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentSignal {
    pub item_id: String,
    pub reorder_qty: f64,
    pub triggered_at: NaiveDateTime,
}

// ==========================================
// NewOrderIntent - 新订单意图
// ==========================================
// 价格刻意留空 (0), 由后续闸门流程确认
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderIntent {
    pub intent_id: String,
    pub item_id: String,
    pub reorder_qty: f64,
    pub week_slot: WeekSlot,
    pub unit_price: f64,
    pub uom: String,
    pub supplier_ref: Option<String>,
    pub triggered_at: NaiveDateTime,
}

/// 补货单未指定供应商时的占位对手方
pub const UNASSIGNED_SUPPLIER: &str = "UNASSIGNED";

impl NewOrderIntent {
    pub fn direction(&self) -> Direction {
        Direction::Inbound
    }

    pub fn counterparty_ref(&self) -> &str {
        self.supplier_ref.as_deref().unwrap_or(UNASSIGNED_SUPPLIER)
    }

    /// 转换为入库订单草稿 (四周循环, 已标记槽位)
    pub fn to_draft(&self, draft_id: &str, deal_id: &str, our_party_ref: &str) -> OrderDraft {
        let mut draft = OrderDraft::new(draft_id, Direction::Inbound, self.counterparty_ref(), our_party_ref);
        draft.deal_id = Some(deal_id.to_string());
        draft.lines = vec![OrderLine::new(&self.item_id, self.reorder_qty, self.unit_price, &self.uom)];
        draft.cadence = Some(CadenceKind::FourWeekly);
        draft.week_slot = Some(self.week_slot);
        draft.notes = format!("补货意图 {} 自动生成, 价格待确认", self.intent_id);
        draft
    }
}

// ==========================================
// PlanningIntent - 计划意图记录
// ==========================================
// 对齐: planning_intent 表; 供看板在定价前看到补货
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningIntent {
    pub intent_id: String,
    pub item_id: String,
    pub quantity: f64,
    pub week_slot: WeekSlot,
    pub status: String,
    pub created_at: NaiveDateTime,
}

pub const PLANNING_STATUS_PENDING_PRICE: &str = "PENDING_PRICE";

impl PlanningIntent {
    pub fn pending_price(intent: &NewOrderIntent) -> Self {
        Self {
            intent_id: intent.intent_id.clone(),
            item_id: intent.item_id.clone(),
            quantity: intent.reorder_qty,
            week_slot: intent.week_slot,
            status: PLANNING_STATUS_PENDING_PRICE.to_string(),
            created_at: intent.triggered_at,
        }
    }
}

// ==========================================
// ReplenishmentOutcome - 观察结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplenishmentOutcome {
    /// 入库方向事件, 不参与补货判断
    IgnoredInbound,
    /// 在库量仍高于再订货点
    AboveReorderPoint { on_hand: f64, reorder_point: f64 },
    /// 触发补货
    Triggered {
        signal: ReplenishmentSignal,
        intent: NewOrderIntent,
    },
}

impl ReplenishmentOutcome {
    pub fn intent(&self) -> Option<&NewOrderIntent> {
        match self {
            ReplenishmentOutcome::Triggered { intent, .. } => Some(intent),
            _ => None,
        }
    }
}

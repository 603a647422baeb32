// ==========================================
// OBARI 生命周期引擎 - 操作日志领域模型
// ==========================================
// 红线: 每次闸门推进/快照写入都必须留痕
// 用途: 交易历史、审计追踪
// ==========================================

use crate::domain::types::DealStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 对齐: action_log 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub deal_id: Option<String>,         // 关联交易 (补货观察等系统动作可为 None)
    pub action_type: String,             // 存储为字符串
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub from_status: Option<DealStatus>,
    pub to_status: Option<DealStatus>,
    pub detail: Option<String>,          // 闸门审计消息
    pub payload_json: Option<JsonValue>,
}

impl ActionLog {
    pub fn new(action_type: ActionType, deal_id: Option<&str>, actor: &str, ts: NaiveDateTime) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            deal_id: deal_id.map(|s| s.to_string()),
            action_type: action_type.as_str().to_string(),
            action_ts: ts,
            actor: actor.to_string(),
            from_status: None,
            to_status: None,
            detail: None,
            payload_json: None,
        }
    }

    pub fn with_transition(mut self, from: DealStatus, to: DealStatus) -> Self {
        self.from_status = Some(from);
        self.to_status = Some(to);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    DealCreated,         // 新建交易
    FactsRecorded,       // 记录事实 (闸门未通过)
    GateAdvanced,        // 闸门推进
    SnapshotLocked,      // 暂存快照锁定
    NotesPatched,        // 快照备注修改
    DealSuperseded,      // 交易被取代
    ReplenishmentIssued, // 补货下单
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::DealCreated => "DealCreated",
            ActionType::FactsRecorded => "FactsRecorded",
            ActionType::GateAdvanced => "GateAdvanced",
            ActionType::SnapshotLocked => "SnapshotLocked",
            ActionType::NotesPatched => "NotesPatched",
            ActionType::DealSuperseded => "DealSuperseded",
            ActionType::ReplenishmentIssued => "ReplenishmentIssued",
        }
    }
}

// ==========================================
// OBARI 生命周期引擎 - 交易 API
// ==========================================
// 职责: 表单提交 → 闸门推进; 预判; 取消/取代; 快照备注; 历史
// 返回: GateResponse { ok, message, missing, status }
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::api::error::{ApiError, ApiResult};
use crate::api::now_ts;
use crate::domain::action_log::ActionLog;
use crate::domain::deal::{Deal, DealFacts};
use crate::domain::staging::{OrderDraft, OrderStagingSnapshot, SnapshotNotes};
use crate::domain::types::{DealStatus, Direction};
use crate::engine::gate::GateError;
use crate::engine::lifecycle::{AdvanceOutcome, DealLifecycleService};

// ==========================================
// GateResponse - 闸门提交结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResponse {
    /// 是否通过
    pub ok: bool,
    /// 通过时的审计消息
    pub message: Option<String>,
    /// 未通过时的缺失事实 (声明顺序)
    pub missing: Vec<String>,
    /// 提交后的交易状态
    pub status: String,
    /// 订单确认时锁定的快照
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

impl GateResponse {
    fn from_outcome(outcome: &AdvanceOutcome) -> Self {
        match outcome {
            AdvanceOutcome::Advanced {
                deal,
                audit_message,
                snapshot,
            } => Self {
                ok: true,
                message: Some(audit_message.clone()),
                missing: Vec::new(),
                status: deal.status.to_string(),
                snapshot_id: snapshot.as_ref().map(|s| s.snapshot_id().to_string()),
            },
            AdvanceOutcome::Blocked { deal, missing } => Self {
                ok: false,
                message: None,
                missing: missing.iter().map(|k| k.to_string()).collect(),
                status: deal.status.to_string(),
                snapshot_id: None,
            },
        }
    }
}

// ==========================================
// DealApi - 交易 API
// ==========================================
pub struct DealApi {
    lifecycle: Arc<DealLifecycleService>,
}

impl DealApi {
    pub fn new(lifecycle: Arc<DealLifecycleService>) -> Self {
        Self { lifecycle }
    }

    /// 新建交易
    ///
    /// # 参数
    /// - direction: "INBOUND" / "OUTBOUND"
    pub fn create_deal(&self, counterparty_ref: &str, direction: &str, actor: &str) -> ApiResult<Deal> {
        let direction = Direction::parse(direction)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知方向: {}", direction)))?;
        Ok(self
            .lifecycle
            .create_deal(counterparty_ref, direction, actor, now_ts())?)
    }

    /// 提交事实并请求推进
    ///
    /// # 参数
    /// - deal_id: 交易ID
    /// - target: 目标状态 (如 "QUOTE_ACCEPTED")
    /// - facts: 表单 JSON 对象
    /// - draft: 订单草稿 (目标为 ORDER_COMMITTED 时必需)
    ///
    /// # 返回
    /// - Ok(GateResponse): 通过或缺失清单
    /// - Err(ApiError::InvalidStateTransition): 非法迁移
    pub fn submit(
        &self,
        deal_id: &str,
        target: &str,
        facts: &JsonValue,
        draft: Option<&OrderDraft>,
        actor: &str,
    ) -> ApiResult<GateResponse> {
        let target = parse_status(target)?;
        let facts = DealFacts::from_json(facts)?;
        let outcome = self
            .lifecycle
            .advance(deal_id, target, &facts, draft, actor, now_ts())?;
        Ok(GateResponse::from_outcome(&outcome))
    }

    /// 预判 (不写库)
    pub fn preview(&self, deal_id: &str, target: &str, facts: Option<&JsonValue>) -> ApiResult<GateResponse> {
        let target = parse_status(target)?;
        let submitted = facts.map(DealFacts::from_json).transpose()?;
        let deal = self.lifecycle.get_deal(deal_id)?;

        match self.lifecycle.preview(deal_id, target, submitted.as_ref())? {
            Ok(message) => Ok(GateResponse {
                ok: true,
                message: Some(message),
                missing: Vec::new(),
                status: deal.status.to_string(),
                snapshot_id: None,
            }),
            Err(GateError::MissingRequirements { missing, .. }) => Ok(GateResponse {
                ok: false,
                message: None,
                missing: missing.iter().map(|k| k.to_string()).collect(),
                status: deal.status.to_string(),
                snapshot_id: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn cancel(&self, deal_id: &str, reason: &str, actor: &str) -> ApiResult<GateResponse> {
        let outcome = self.lifecycle.cancel(deal_id, reason, actor, now_ts())?;
        Ok(GateResponse::from_outcome(&outcome))
    }

    /// 取代交易, 返回新交易
    pub fn supersede(&self, deal_id: &str, reason: &str, actor: &str) -> ApiResult<Deal> {
        Ok(self.lifecycle.supersede(deal_id, reason, actor, now_ts())?)
    }

    pub fn get_deal(&self, deal_id: &str) -> ApiResult<Deal> {
        Ok(self.lifecycle.get_deal(deal_id)?)
    }

    /// 当前状态可前往的目标
    pub fn allowed_targets(&self, deal_id: &str) -> ApiResult<Vec<String>> {
        let deal = self.lifecycle.get_deal(deal_id)?;
        Ok(self
            .lifecycle
            .gate()
            .targets_from(deal.status)
            .into_iter()
            .map(|s| s.to_string())
            .collect())
    }

    pub fn history(&self, deal_id: &str) -> ApiResult<Vec<ActionLog>> {
        if deal_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("交易ID不能为空".to_string()));
        }
        Ok(self.lifecycle.history(deal_id)?)
    }

    pub fn get_snapshot(&self, snapshot_id: &str) -> ApiResult<OrderStagingSnapshot> {
        Ok(self.lifecycle.staging().get(snapshot_id)?)
    }

    /// 修改快照备注 (快照唯一可改字段)
    pub fn patch_snapshot_notes(
        &self,
        snapshot_id: &str,
        notes: &str,
        actor: &str,
    ) -> ApiResult<OrderStagingSnapshot> {
        Ok(self.lifecycle.patch_snapshot_notes(
            snapshot_id,
            SnapshotNotes::new(notes),
            actor,
            now_ts(),
        )?)
    }
}

fn parse_status(raw: &str) -> ApiResult<DealStatus> {
    DealStatus::parse(raw).ok_or_else(|| ApiError::InvalidInput(format!("未知状态: {}", raw)))
}

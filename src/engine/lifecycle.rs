// ==========================================
// OBARI 生命周期引擎 - 交易生命周期编排
// ==========================================
// 职责: 读取交易 → 合并事实 → 闸门判定 → (订单确认时锁定快照)
//       → 乐观锁写回 → 追加审计 → 发布事件
// 红线: 状态只经 GateController 推进; 闸门本身不落库
// 顺序: 快照先于交易状态写入; 同一交易以相同条款重试时复用该快照
// 事务: 交易写回与审计行 (及取代时的新交易) 同一事务提交
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::deal::{Deal, DealFacts, DealOrigin, FactError, FactKey, FactValue};
use crate::domain::replenishment::{NewOrderIntent, PlanningIntent};
use crate::domain::staging::{OrderDraft, OrderStagingSnapshot, SnapshotNotes};
use crate::domain::types::{DealStatus, Direction};
use crate::engine::events::{LifecycleEvent, LifecycleEventType, OptionalEventPublisher};
use crate::engine::gate::{GateController, GateError};
use crate::engine::replenishment::ReplenishmentError;
use crate::engine::repositories::LifecycleRepositories;
use crate::engine::staging::{OrderStagingService, StagingError};
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryError;
use crate::repository::{ActionLogRepository, DealRepository, PlanningIntentRepository};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

/// 默认我方主体
pub const DEFAULT_OUR_PARTY_REF: &str = "OBARI";

// ==========================================
// LifecycleError - 编排层错误
// ==========================================
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("交易不存在: {deal_id}")]
    DealNotFound { deal_id: String },

    #[error("输入无效: {0}")]
    InvalidInput(String),

    #[error("订单确认需要提供订单草稿: deal_id={deal_id}")]
    DraftRequired { deal_id: String },

    #[error("订单草稿与交易不匹配: deal_id={deal_id}, {reason}")]
    DraftMismatch { deal_id: String, reason: String },

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Fact(#[from] FactError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Replenishment(#[from] ReplenishmentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// AdvanceOutcome - 推进结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvanceOutcome {
    /// 闸门通过, 状态已写入
    Advanced {
        deal: Deal,
        audit_message: String,
        snapshot: Option<OrderStagingSnapshot>,
    },
    /// 事实不全; 新提交的事实已保存, 状态不变
    Blocked { deal: Deal, missing: Vec<FactKey> },
}

impl AdvanceOutcome {
    pub fn deal(&self) -> &Deal {
        match self {
            AdvanceOutcome::Advanced { deal, .. } | AdvanceOutcome::Blocked { deal, .. } => deal,
        }
    }

    pub fn is_advanced(&self) -> bool {
        matches!(self, AdvanceOutcome::Advanced { .. })
    }
}

/// 补货意图回灌结果: 新交易 + 待订单确认时锁定的草稿
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplenishmentDeal {
    pub deal: Deal,
    pub draft: OrderDraft,
}

// ==========================================
// DealLifecycleService
// ==========================================
pub struct DealLifecycleService {
    repos: LifecycleRepositories,
    gate: GateController,
    staging: OrderStagingService,
    publisher: OptionalEventPublisher,
    our_party_ref: String,
}

impl DealLifecycleService {
    pub fn new(repos: LifecycleRepositories) -> Self {
        let staging = OrderStagingService::new(repos.staging_store.clone());
        Self {
            repos,
            gate: GateController::new(),
            staging,
            publisher: OptionalEventPublisher::none(),
            our_party_ref: DEFAULT_OUR_PARTY_REF.to_string(),
        }
    }

    pub fn with_publisher(mut self, publisher: OptionalEventPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_snapshot_series(mut self, series: &str) -> Self {
        self.staging = self.staging.with_series(series);
        self
    }

    pub fn with_our_party_ref(mut self, our_party_ref: &str) -> Self {
        let our_party_ref = our_party_ref.trim();
        if !our_party_ref.is_empty() {
            self.our_party_ref = our_party_ref.to_string();
        }
        self
    }

    pub fn staging(&self) -> &OrderStagingService {
        &self.staging
    }

    pub fn gate(&self) -> &GateController {
        &self.gate
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_deal(&self, deal_id: &str) -> Result<Deal, LifecycleError> {
        self.repos
            .deal_repo
            .find_by_id(deal_id)?
            .ok_or_else(|| LifecycleError::DealNotFound {
                deal_id: deal_id.to_string(),
            })
    }

    /// 交易历史 (时间升序)
    pub fn history(&self, deal_id: &str) -> Result<Vec<ActionLog>, LifecycleError> {
        Ok(self.repos.action_log_repo.find_by_deal_id(deal_id)?)
    }

    /// 预判闸门 (不写库)
    ///
    /// # 参数
    /// - `submitted`: 假设将要提交的事实, 与已存事实合并后判定
    ///
    /// # 返回
    /// - 外层 Err: 交易不存在、事实与已确认值冲突或存储错误
    /// - 内层: 闸门判定结果
    pub fn preview(
        &self,
        deal_id: &str,
        target: DealStatus,
        submitted: Option<&DealFacts>,
    ) -> Result<Result<String, GateError>, LifecycleError> {
        let deal = self.get_deal(deal_id)?;
        let facts = match submitted {
            Some(incoming) => deal.facts.merged(incoming)?,
            None => deal.facts,
        };
        Ok(self.gate.evaluate_transition(deal.status, target, &facts))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新建线索阶段交易
    #[instrument(skip(self))]
    pub fn create_deal(
        &self,
        counterparty_ref: &str,
        direction: Direction,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<Deal, LifecycleError> {
        if counterparty_ref.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "counterparty_ref 不能为空".to_string(),
            ));
        }
        let deal = Deal::new_lead(counterparty_ref, direction, DealOrigin::Manual, now);
        let log = ActionLog::new(ActionType::DealCreated, Some(&deal.deal_id), actor, now)
            .with_detail(format!("新建交易: 对手方={}, 方向={}", deal.counterparty_ref, direction));
        self.repos.unit_of_work.run(|tx| {
            DealRepository::insert_in(tx, &deal)?;
            ActionLogRepository::insert_in(tx, &log)?;
            Ok(())
        })?;

        tracing::info!(deal_id = %deal.deal_id, "交易已创建");
        self.publisher.publish_quietly(LifecycleEvent::new(
            LifecycleEventType::DealCreated,
            Some(&deal.deal_id),
            "deal created",
            now,
        ));
        Ok(deal)
    }

    /// 推进交易状态
    ///
    /// # 参数
    /// - `deal_id`: 交易 id
    /// - `target`: 目标状态
    /// - `submitted`: 本次提交的事实 (与已存事实合并)
    /// - `draft`: 订单草稿, 仅目标为 ORDER_COMMITTED 时必需
    /// - `actor`: 操作人
    /// - `now`: 操作时间
    ///
    /// # 返回
    /// - `Ok(Advanced)`: 已推进 (状态与审计行同一事务提交)
    /// - `Ok(Blocked)`: 缺少事实, 已保存合并后的事实
    /// - `Err(Gate(UnknownTransition))`: 非法迁移, 不写库
    /// - `Err(Fact(AlreadySettled))`: 改写已确认的事实, 不写库
    /// - `Err(Staging(AlreadyLocked))`: 草稿已按其他条款锁定
    /// - `Err(Repository(OptimisticLockFailure))`: 并发修改
    #[instrument(skip(self, submitted, draft))]
    pub fn advance(
        &self,
        deal_id: &str,
        target: DealStatus,
        submitted: &DealFacts,
        draft: Option<&OrderDraft>,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<AdvanceOutcome, LifecycleError> {
        let _perf = PerfGuard::new("deal.advance");

        let deal = self.get_deal(deal_id)?;
        match self.plan_transition(deal, target, submitted, draft, actor, now)? {
            Transition::Blocked {
                mut deal,
                missing,
                record,
            } => {
                if let Some(record) = record {
                    deal.revision = self.commit(&deal, None, std::slice::from_ref(&record))?;
                }
                tracing::info!(deal_id, missing = missing.len(), "闸门未通过");
                Ok(AdvanceOutcome::Blocked { deal, missing })
            }
            Transition::Advance {
                mut deal,
                from,
                audit_message,
                snapshot,
                logs,
            } => {
                deal.revision = self.commit(&deal, None, &logs)?;

                tracing::info!(deal_id, from = %from, to = %target, "闸门通过");
                self.publisher
                    .publish_quietly(gate_event(&deal, from, &audit_message, snapshot.as_ref(), now));
                Ok(AdvanceOutcome::Advanced {
                    deal,
                    audit_message,
                    snapshot,
                })
            }
        }
    }

    /// 合并事实并判定闸门, 产出待写入的变更 (交易表与审计表均未写入)
    ///
    /// ORDER_COMMITTED 的快照在此锁定; 快照先于交易写回落库,
    /// 写回失败后同一交易以相同草稿重试时复用该快照
    fn plan_transition(
        &self,
        mut deal: Deal,
        target: DealStatus,
        submitted: &DealFacts,
        draft: Option<&OrderDraft>,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<Transition, LifecycleError> {
        let from = deal.status;
        // 非法迁移优先于事实冲突报告
        if self.gate.gate_for(from, target).is_none() {
            return Err(GateError::UnknownTransition { from, to: target }.into());
        }
        let merged = deal.facts.merged(submitted)?;

        let audit_message = match self.gate.evaluate_transition(from, target, &merged) {
            Ok(message) => message,
            Err(GateError::MissingRequirements { missing, .. }) => {
                let record = if merged != deal.facts {
                    deal.facts = merged;
                    deal.updated_at = now;
                    Some(
                        ActionLog::new(ActionType::FactsRecorded, Some(&deal.deal_id), actor, now)
                            .with_detail(format!(
                                "{} → {} 未通过, 缺失: {}",
                                from,
                                target,
                                missing.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
                            ))
                            .with_payload(submitted.to_json()),
                    )
                } else {
                    None
                };
                return Ok(Transition::Blocked {
                    deal,
                    missing,
                    record,
                });
            }
            Err(e @ GateError::UnknownTransition { .. }) => return Err(e.into()),
        };

        let snapshot = if target == DealStatus::OrderCommitted {
            let draft = draft.ok_or_else(|| LifecycleError::DraftRequired {
                deal_id: deal.deal_id.clone(),
            })?;
            Some(self.lock_draft_for(&deal, draft, now)?)
        } else {
            None
        };

        deal.status = target;
        deal.facts = merged;
        deal.updated_at = now;

        let mut logs = vec![ActionLog::new(ActionType::GateAdvanced, Some(&deal.deal_id), actor, now)
            .with_transition(from, target)
            .with_detail(audit_message.clone())
            .with_payload(submitted.to_json())];
        if let Some(snapshot) = &snapshot {
            deal.snapshot_id = Some(snapshot.snapshot_id().to_string());
            logs.push(
                ActionLog::new(ActionType::SnapshotLocked, Some(&deal.deal_id), actor, now)
                    .with_detail(format!(
                        "暂存快照 {} 已锁定, 运输分类 {}",
                        snapshot.snapshot_id(),
                        snapshot.transport_class().as_str()
                    ))
                    .with_payload(serde_json::to_value(snapshot).map_err(RepositoryError::from)?),
            );
        }

        Ok(Transition::Advance {
            deal,
            from,
            audit_message,
            snapshot,
            logs,
        })
    }

    /// 单事务写入: 交易写回 (乐观锁) + 可选新交易 + 审计行
    ///
    /// # 返回
    /// - `Ok(revision)`: 写回后的 revision
    fn commit(
        &self,
        updated: &Deal,
        created: Option<&Deal>,
        logs: &[ActionLog],
    ) -> Result<i32, LifecycleError> {
        let revision = self.repos.unit_of_work.run(|tx| {
            let revision = DealRepository::update_in(tx, updated)?;
            if let Some(created) = created {
                DealRepository::insert_in(tx, created)?;
            }
            for log in logs {
                ActionLogRepository::insert_in(tx, log)?;
            }
            Ok(revision)
        })?;
        Ok(revision)
    }

    /// 锁定订单草稿
    ///
    /// 同一交易以相同条款重试时复用已锁定的快照; 条款有变化时报 AlreadyLocked
    fn lock_draft_for(
        &self,
        deal: &Deal,
        draft: &OrderDraft,
        now: NaiveDateTime,
    ) -> Result<OrderStagingSnapshot, LifecycleError> {
        if let Some(draft_deal) = draft.deal_id.as_deref() {
            if draft_deal != deal.deal_id {
                return Err(LifecycleError::DraftMismatch {
                    deal_id: deal.deal_id.clone(),
                    reason: format!("草稿属于交易 {}", draft_deal),
                });
            }
        }
        if draft.direction != deal.direction {
            return Err(LifecycleError::DraftMismatch {
                deal_id: deal.deal_id.clone(),
                reason: format!("方向不一致: 草稿 {}, 交易 {}", draft.direction, deal.direction),
            });
        }

        let mut bound = draft.clone();
        bound.deal_id = Some(deal.deal_id.clone());

        match self
            .staging
            .lock_from_draft(&bound, self.repos.number_series.as_ref(), now)
        {
            Ok(snapshot) => Ok(snapshot),
            Err(StagingError::AlreadyLocked { snapshot_id, draft_id }) => {
                let existing = self.staging.get(&snapshot_id)?;
                if self.staging.freezes_to(&bound, &existing) {
                    tracing::warn!(
                        deal_id = %deal.deal_id,
                        snapshot_id = %snapshot_id,
                        "复用此前已锁定的快照"
                    );
                    Ok(existing)
                } else {
                    Err(StagingError::AlreadyLocked {
                        draft_id,
                        snapshot_id,
                    }
                    .into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 取消交易 (经 CANCELLED 闸门)
    pub fn cancel(
        &self,
        deal_id: &str,
        reason: &str,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<AdvanceOutcome, LifecycleError> {
        self.advance(
            deal_id,
            DealStatus::Cancelled,
            &cancellation_facts(reason)?,
            None,
            actor,
            now,
        )
    }

    /// 取代交易
    ///
    /// 旧交易取消, 新交易回到 LEAD 并继承旧事实 (不含取消原因), 双向关联;
    /// 取消、新建、关联与审计在同一事务内提交
    ///
    /// # 返回
    /// - `Ok(new_deal)`: 新交易
    /// - `Err(Gate(..))`: 旧交易无法取消 (终止态 / 执行中 / 原因为空), 不写库
    #[instrument(skip(self))]
    pub fn supersede(
        &self,
        deal_id: &str,
        reason: &str,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<Deal, LifecycleError> {
        let deal = self.get_deal(deal_id)?;
        let cancellation = cancellation_facts(reason)?;
        let (mut old, from, audit_message, mut logs) =
            match self.plan_transition(deal, DealStatus::Cancelled, &cancellation, None, actor, now)? {
                Transition::Advance {
                    deal,
                    from,
                    audit_message,
                    logs,
                    ..
                } => (deal, from, audit_message, logs),
                Transition::Blocked { deal, missing, .. } => {
                    return Err(GateError::MissingRequirements {
                        from: deal.status,
                        to: DealStatus::Cancelled,
                        missing,
                    }
                    .into())
                }
            };

        let mut replacement =
            Deal::new_lead(&old.counterparty_ref, old.direction, old.origin.clone(), now);
        replacement.facts = old.facts.without(FactKey::CancellationReason);
        replacement.supersedes = Some(old.deal_id.clone());
        old.superseded_by = Some(replacement.deal_id.clone());

        logs.push(
            ActionLog::new(ActionType::DealSuperseded, Some(&old.deal_id), actor, now)
                .with_detail(format!("被交易 {} 取代: {}", replacement.deal_id, reason.trim())),
        );
        logs.push(
            ActionLog::new(ActionType::DealCreated, Some(&replacement.deal_id), actor, now)
                .with_detail(format!("取代交易 {}", old.deal_id)),
        );
        old.revision = self.commit(&old, Some(&replacement), &logs)?;

        tracing::info!(old = %old.deal_id, new = %replacement.deal_id, "交易已取代");
        self.publisher
            .publish_quietly(gate_event(&old, from, &audit_message, None, now));
        self.publisher.publish_quietly(LifecycleEvent::new(
            LifecycleEventType::DealSuperseded,
            Some(&old.deal_id),
            format!("superseded by {}", replacement.deal_id),
            now,
        ));
        Ok(replacement)
    }

    /// 补货意图回灌: 计划意图 + 入库线索交易 + 审计行同一事务写入, 并生成草稿
    ///
    /// 计划意图按 intent_id 去重, 观察者已单独记录过时不会重复
    #[instrument(skip(self, intent), fields(intent_id = %intent.intent_id))]
    pub fn ingest_replenishment(
        &self,
        intent: &NewOrderIntent,
        actor: &str,
    ) -> Result<ReplenishmentDeal, LifecycleError> {
        let now = intent.triggered_at;
        let mut deal = Deal::new_lead(
            intent.counterparty_ref(),
            intent.direction(),
            DealOrigin::Replenishment {
                intent_id: intent.intent_id.clone(),
            },
            now,
        );
        deal.facts = DealFacts::from_json(&json!({
            "itemId": intent.item_id,
            "reorderQty": intent.reorder_qty,
            "weekSlot": intent.week_slot.as_str(),
            "pricePending": true,
        }))?;

        let draft = intent.to_draft(
            &format!("RPL-{}", intent.intent_id),
            &deal.deal_id,
            &self.our_party_ref,
        );
        let log = ActionLog::new(ActionType::ReplenishmentIssued, Some(&deal.deal_id), actor, now)
            .with_detail(format!(
                "补货: 物料={}, 数量={}, 槽位={}",
                intent.item_id, intent.reorder_qty, intent.week_slot
            ))
            .with_payload(serde_json::to_value(&draft).map_err(RepositoryError::from)?);
        let planning = PlanningIntent::pending_price(intent);

        self.repos.unit_of_work.run(|tx| {
            PlanningIntentRepository::record_if_absent_in(tx, &planning)?;
            DealRepository::insert_in(tx, &deal)?;
            ActionLogRepository::insert_in(tx, &log)?;
            Ok(())
        })?;

        tracing::info!(deal_id = %deal.deal_id, item_id = %intent.item_id, "补货交易已创建");
        self.publisher.publish_quietly(LifecycleEvent::new(
            LifecycleEventType::ReplenishmentIssued,
            Some(&deal.deal_id),
            format!("reorder {} x {}", intent.item_id, intent.reorder_qty),
            now,
        ));
        Ok(ReplenishmentDeal { deal, draft })
    }

    /// 修改快照备注 (唯一允许的快照写入)
    pub fn patch_snapshot_notes(
        &self,
        snapshot_id: &str,
        notes: SnapshotNotes,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<OrderStagingSnapshot, LifecycleError> {
        let snapshot = self.staging.patch_notes_only(snapshot_id, notes)?;
        self.repos.action_log_repo.insert(
            &ActionLog::new(ActionType::NotesPatched, snapshot.deal_id(), actor, now)
                .with_detail(format!("快照 {} 备注已修改", snapshot_id))
                .with_payload(json!({ "notes": snapshot.notes().as_str() })),
        )?;

        self.publisher.publish_quietly(
            LifecycleEvent::new(
                LifecycleEventType::NotesPatched,
                snapshot.deal_id(),
                "notes patched",
                now,
            )
            .with_snapshot(snapshot_id),
        );
        Ok(snapshot)
    }
}

/// 闸门判定后、写库前的变更
enum Transition {
    Blocked {
        deal: Deal,
        missing: Vec<FactKey>,
        /// 有新事实时需要写入的审计行
        record: Option<ActionLog>,
    },
    Advance {
        deal: Deal,
        from: DealStatus,
        audit_message: String,
        snapshot: Option<OrderStagingSnapshot>,
        logs: Vec<ActionLog>,
    },
}

fn cancellation_facts(reason: &str) -> Result<DealFacts, FactError> {
    let mut facts = DealFacts::new();
    facts.insert(FactKey::CancellationReason, FactValue::Text(reason.to_string()))?;
    Ok(facts)
}

fn gate_event(
    deal: &Deal,
    from: DealStatus,
    audit_message: &str,
    snapshot: Option<&OrderStagingSnapshot>,
    now: NaiveDateTime,
) -> LifecycleEvent {
    let event = LifecycleEvent::new(
        LifecycleEventType::GateAdvanced,
        Some(&deal.deal_id),
        audit_message,
        now,
    )
    .with_transition(from, deal.status);
    match snapshot {
        Some(snapshot) => event.with_snapshot(snapshot.snapshot_id()),
        None => event,
    }
}

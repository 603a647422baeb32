// ==========================================
// OBARI 生命周期引擎 - 订单暂存服务
// ==========================================
// 红线: 快照锁定后仅 notes 可改; 不提供通用 update
//       条款变更只能走交易取代 (supersede)
// ==========================================
// 职责: 草稿校验 → 运输分类派生 → 排程盖章 → 发号 → 持久化
// ==========================================

use crate::domain::staging::{
    OrderDraft, OrderStagingSnapshot, ScheduleDescriptor, SnapshotNotes, SnapshotParts,
};
use crate::domain::types::{SnapshotStatus, TransportClass};
use crate::engine::cadence::CadenceScheduler;
use crate::repository::error::RepositoryError;
use crate::repository::number_series_repo::NumberSeries;
use crate::repository::staging_repo::OrderStagingStore;
use chrono::NaiveDateTime;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// 默认快照编号序列
pub const DEFAULT_SNAPSHOT_SERIES: &str = "STG";

// ==========================================
// StagingError - 暂存错误
// ==========================================
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("订单草稿无效: {reason}")]
    InvalidDraft { reason: String },

    #[error("暂存快照不存在: {snapshot_id}")]
    NotFound { snapshot_id: String },

    #[error("草稿已锁定: draft_id={draft_id}, snapshot_id={snapshot_id}")]
    AlreadyLocked {
        draft_id: String,
        snapshot_id: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl StagingError {
    fn invalid(reason: impl Into<String>) -> Self {
        StagingError::InvalidDraft {
            reason: reason.into(),
        }
    }
}

// ==========================================
// OrderStagingService
// ==========================================
pub struct OrderStagingService {
    store: Arc<dyn OrderStagingStore>,
    scheduler: CadenceScheduler,
    series: String,
}

impl OrderStagingService {
    pub fn new(store: Arc<dyn OrderStagingStore>) -> Self {
        Self {
            store,
            scheduler: CadenceScheduler::new(),
            series: DEFAULT_SNAPSHOT_SERIES.to_string(),
        }
    }

    /// 指定快照编号序列 (空白时保留默认值)
    pub fn with_series(mut self, series: &str) -> Self {
        let series = series.trim();
        if !series.is_empty() {
            self.series = series.to_string();
        }
        self
    }

    /// 锁定草稿, 生成不可变暂存快照
    ///
    /// # 参数
    /// - `draft`: 订单草稿
    /// - `number_series`: 快照编号发放器
    /// - `now`: 锁定时间 (同时作为无执行日期草稿的排程基准)
    ///
    /// # 返回
    /// - `Ok(snapshot)`: 已持久化的快照
    /// - `Err(InvalidDraft)`: 草稿校验不通过
    /// - `Err(AlreadyLocked)`: 同一草稿已锁定过
    #[instrument(skip(self, draft, number_series), fields(draft_id = %draft.draft_id))]
    pub fn lock_from_draft(
        &self,
        draft: &OrderDraft,
        number_series: &dyn NumberSeries,
        now: NaiveDateTime,
    ) -> Result<OrderStagingSnapshot, StagingError> {
        validate_draft(draft)?;
        let draft_id = draft.draft_id.trim();

        if let Some(existing) = self.store.find_by_draft_id(draft_id)? {
            return Err(StagingError::AlreadyLocked {
                draft_id: draft_id.to_string(),
                snapshot_id: existing.snapshot_id().to_string(),
            });
        }

        let schedule = self.resolve_schedule(draft, now);

        let snapshot_id = number_series.next_number(&self.series)?;
        let snapshot = OrderStagingSnapshot::from_parts(SnapshotParts {
            snapshot_id,
            draft_id: draft_id.to_string(),
            deal_id: draft.deal_id.clone(),
            direction: draft.direction,
            counterparty_ref: draft.counterparty_ref.trim().to_string(),
            our_party_ref: draft.our_party_ref.trim().to_string(),
            schedule,
            transport_terms: draft.transport,
            transport_class: draft.transport.classify(),
            lines: draft.lines.clone(),
            notes: SnapshotNotes::new(draft.notes.clone()),
            created_at: now,
            status: SnapshotStatus::Staging,
        });

        match self.store.create(&snapshot) {
            Ok(()) => {}
            // 并发锁定同一草稿: 唯一约束兜底
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                return match self.store.find_by_draft_id(draft_id)? {
                    Some(existing) => Err(StagingError::AlreadyLocked {
                        draft_id: draft_id.to_string(),
                        snapshot_id: existing.snapshot_id().to_string(),
                    }),
                    None => Err(RepositoryError::UniqueConstraintViolation(msg).into()),
                };
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            snapshot_id = snapshot.snapshot_id(),
            transport_class = snapshot.transport_class().as_str(),
            lines = snapshot.lines().len(),
            "暂存快照已锁定"
        );
        Ok(snapshot)
    }

    /// 排程盖章: 有节奏时取指定槽位或按执行日期 (缺省为 now) 推算, 否则为临时单
    fn resolve_schedule(&self, draft: &OrderDraft, now: NaiveDateTime) -> ScheduleDescriptor {
        match draft.cadence {
            Some(kind) => {
                let anchor_date = draft.execution_date.unwrap_or_else(|| now.date());
                ScheduleDescriptor::Recurring {
                    kind,
                    week_slot: draft
                        .week_slot
                        .unwrap_or_else(|| self.scheduler.week_slot_for(anchor_date)),
                }
            }
            None => ScheduleDescriptor::AdHoc {
                date: draft.execution_date,
            },
        }
    }

    /// 草稿按快照锁定时刻重新冻结后, 条款是否与快照一致
    ///
    /// 比较: 交易、方向、双方主体、订单行、运输条款、排程; 备注不参与比较
    pub fn freezes_to(&self, draft: &OrderDraft, snapshot: &OrderStagingSnapshot) -> bool {
        draft.deal_id.as_deref() == snapshot.deal_id()
            && draft.direction == snapshot.direction()
            && draft.counterparty_ref.trim() == snapshot.counterparty_ref()
            && draft.our_party_ref.trim() == snapshot.our_party_ref()
            && draft.lines.as_slice() == snapshot.lines()
            && draft.transport == snapshot.transport_terms()
            && self.resolve_schedule(draft, snapshot.created_at()) == snapshot.schedule()
    }

    /// 仅修改快照备注
    ///
    /// # 返回
    /// - `Ok(snapshot)`: 修改后的快照
    /// - `Err(NotFound)`: 快照不存在
    pub fn patch_notes_only(
        &self,
        snapshot_id: &str,
        notes: SnapshotNotes,
    ) -> Result<OrderStagingSnapshot, StagingError> {
        if !self.store.update_notes(snapshot_id, &notes)? {
            return Err(StagingError::NotFound {
                snapshot_id: snapshot_id.to_string(),
            });
        }
        tracing::debug!(snapshot_id = snapshot_id, "快照备注已更新");
        self.get(snapshot_id)
    }

    /// 按存储的运输条款重新派生运输分类
    pub fn transport_flag(&self, snapshot_id: &str) -> Result<TransportClass, StagingError> {
        Ok(self.get(snapshot_id)?.transport_terms().classify())
    }

    pub fn get(&self, snapshot_id: &str) -> Result<OrderStagingSnapshot, StagingError> {
        self.store
            .get_by_id(snapshot_id)?
            .ok_or_else(|| StagingError::NotFound {
                snapshot_id: snapshot_id.to_string(),
            })
    }
}

/// 草稿校验
pub fn validate_draft(draft: &OrderDraft) -> Result<(), StagingError> {
    if draft.draft_id.trim().is_empty() {
        return Err(StagingError::invalid("draft_id 不能为空"));
    }
    if draft.counterparty_ref.trim().is_empty() {
        return Err(StagingError::invalid("counterparty_ref 不能为空"));
    }
    if draft.lines.is_empty() {
        return Err(StagingError::invalid("至少需要一个订单行"));
    }
    for (idx, line) in draft.lines.iter().enumerate() {
        if line.sku.trim().is_empty() {
            return Err(StagingError::invalid(format!("第 {} 行 sku 为空", idx + 1)));
        }
        if !line.quantity.is_finite() || line.quantity <= 0.0 {
            return Err(StagingError::invalid(format!(
                "第 {} 行数量必须为正数: {}",
                idx + 1,
                line.quantity
            )));
        }
        if !line.unit_price.is_finite() || line.unit_price < 0.0 {
            return Err(StagingError::invalid(format!(
                "第 {} 行单价不能为负: {}",
                idx + 1,
                line.unit_price
            )));
        }
    }
    Ok(())
}

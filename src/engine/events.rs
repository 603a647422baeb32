// ==========================================
// OBARI 生命周期引擎 - 生命周期事件发布
// ==========================================
// 职责: 定义生命周期事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，外部通知/看板层实现适配器
// 约定: 发布为"发出即忘", 失败只记日志, 不影响主流程
// ==========================================

use crate::domain::types::DealStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 生命周期事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEventType {
    /// 新建交易
    DealCreated,
    /// 闸门推进
    GateAdvanced,
    /// 暂存快照锁定
    SnapshotLocked,
    /// 快照备注修改
    NotesPatched,
    /// 交易被取代
    DealSuperseded,
    /// 补货意图回灌
    ReplenishmentIssued,
}

impl LifecycleEventType {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleEventType::DealCreated => "DealCreated",
            LifecycleEventType::GateAdvanced => "GateAdvanced",
            LifecycleEventType::SnapshotLocked => "SnapshotLocked",
            LifecycleEventType::NotesPatched => "NotesPatched",
            LifecycleEventType::DealSuperseded => "DealSuperseded",
            LifecycleEventType::ReplenishmentIssued => "ReplenishmentIssued",
        }
    }
}

/// 生命周期事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_type: LifecycleEventType,
    /// 关联交易 (快照备注修改时可能为空)
    pub deal_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub from_status: Option<DealStatus>,
    pub to_status: Option<DealStatus>,
    /// 闸门审计消息或事件说明
    pub message: String,
    pub occurred_at: NaiveDateTime,
}

impl LifecycleEvent {
    pub fn new(
        event_type: LifecycleEventType,
        deal_id: Option<&str>,
        message: impl Into<String>,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            event_type,
            deal_id: deal_id.map(|s| s.to_string()),
            snapshot_id: None,
            from_status: None,
            to_status: None,
            message: message.into(),
            occurred_at,
        }
    }

    pub fn with_transition(mut self, from: DealStatus, to: DealStatus) -> Self {
        self.from_status = Some(from);
        self.to_status = Some(to);
        self
    }

    pub fn with_snapshot(mut self, snapshot_id: &str) -> Self {
        self.snapshot_id = Some(snapshot_id.to_string());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 生命周期事件发布者 Trait
///
/// # 实现说明
/// - 实现者负责投递到通知渠道/审计汇
/// - 返回的错误只会被记录, 不会回滚已提交的状态
pub trait LifecycleEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(receipt)`: 投递回执（如果支持）或空字符串
    /// - `Err`: 发布失败
    fn publish(&self, event: LifecycleEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl LifecycleEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: LifecycleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - deal_id={:?}, event_type={}",
            event.deal_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn LifecycleEventPublisher>> 的使用
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn LifecycleEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn LifecycleEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: LifecycleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - deal_id={:?}, event_type={}",
                    event.deal_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 发出即忘: 失败只记录 warn
    pub fn publish_quietly(&self, event: LifecycleEvent) {
        let event_type = event.event_type;
        let deal_id = event.deal_id.clone();
        if let Err(e) = self.publish(event) {
            tracing::warn!(
                event_type = event_type.as_str(),
                deal_id = ?deal_id,
                error = %e,
                "生命周期事件发布失败, 已忽略"
            );
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

// ==========================================
// OBARI 生命周期引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为用户友好的错误消息
// 约定: 闸门未通过不是"失败", 必须带出缺失事实清单
// ==========================================

use crate::domain::deal::FactError;
use crate::engine::gate::GateError;
use crate::engine::lifecycle::LifecycleError;
use crate::engine::replenishment::ReplenishmentError;
use crate::engine::staging::StagingError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 对外错误
///
/// 闸门未通过 (GateBlocked) 与修订号过期 (StaleRevision) 是调用方可处理的业务结果,
/// Storage / InternalError 才是基础设施故障
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 闸门 =====
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("前置条件不满足: {from} → {to}, 缺失: {}", .missing.join(", "))]
    GateBlocked {
        from: String,
        to: String,
        missing: Vec<String>,
    },

    // ===== 请求 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ===== 冲突 =====
    #[error("交易 {deal_id} 已被并发修改 (期望 revision={expected}, 实际 revision={actual}), 请重新读取后重试")]
    StaleRevision {
        deal_id: String,
        expected: i32,
        actual: i32,
    },

    #[error("草稿已锁定为快照 {snapshot_id} (draft_id={draft_id})")]
    AlreadyLocked {
        draft_id: String,
        snapshot_id: String,
    },

    #[error("操作冲突: {0}")]
    Conflict(String),

    // ===== 基础设施 =====
    #[error("存储故障: {0}")]
    Storage(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity_id,
                expected,
                actual,
            } => ApiError::StaleRevision {
                deal_id: entity_id,
                expected,
                actual,
            },
            RepositoryError::ImmutableRecord(msg) => {
                ApiError::Conflict(format!("快照锁定字段不可修改 ({})", msg))
            }
            RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} {}", entity, id))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("存储列 {} 无法解析: {}", field, message))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::Storage(msg),
            RepositoryError::LockError(msg) => ApiError::Storage(format!("连接锁不可用: {}", msg)),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::UnknownTransition { from, to } => ApiError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            GateError::MissingRequirements { from, to, missing } => ApiError::GateBlocked {
                from: from.to_string(),
                to: to.to_string(),
                missing: missing.iter().map(|k| k.to_string()).collect(),
            },
        }
    }
}

impl From<FactError> for ApiError {
    fn from(err: FactError) -> Self {
        match err {
            FactError::AlreadySettled { .. } | FactError::DocumentSettled { .. } => {
                ApiError::Conflict(err.to_string())
            }
            FactError::WrongKind { .. } | FactError::NotAnObject => {
                ApiError::ValidationError(err.to_string())
            }
        }
    }
}

impl From<StagingError> for ApiError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::InvalidDraft { reason } => ApiError::ValidationError(reason),
            StagingError::NotFound { snapshot_id } => {
                ApiError::NotFound(format!("暂存快照(id={})不存在", snapshot_id))
            }
            StagingError::AlreadyLocked {
                draft_id,
                snapshot_id,
            } => ApiError::AlreadyLocked {
                draft_id,
                snapshot_id,
            },
            StagingError::Repository(e) => e.into(),
        }
    }
}

impl From<ReplenishmentError> for ApiError {
    fn from(err: ReplenishmentError) -> Self {
        match err {
            ReplenishmentError::InvalidEvent(msg) => ApiError::InvalidInput(msg),
            ReplenishmentError::Repository(e) => e.into(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::DealNotFound { deal_id } => {
                ApiError::NotFound(format!("交易(id={})不存在", deal_id))
            }
            LifecycleError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            e @ LifecycleError::DraftRequired { .. } => ApiError::InvalidInput(e.to_string()),
            e @ LifecycleError::DraftMismatch { .. } => ApiError::Conflict(e.to_string()),
            LifecycleError::Gate(e) => e.into(),
            LifecycleError::Fact(e) => e.into(),
            LifecycleError::Staging(e) => e.into(),
            LifecycleError::Replenishment(e) => e.into(),
            LifecycleError::Repository(e) => e.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

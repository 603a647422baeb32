// ==========================================
// OBARI 生命周期引擎 - 阶段闸门控制器
// ==========================================
// 红线: 纯函数判定, 不持久化, 不读时钟, 不产生副作用
// ==========================================
// 职责: 判定 (当前状态 → 目标状态) 是否合法, 缺哪些事实
// 输入: 当前状态 + 目标状态 + 事实包
// 输出: 审计消息 / 缺失事实清单 / 未知迁移
// ==========================================

use crate::domain::deal::{DealFacts, FactKey};
use crate::domain::types::DealStatus;
use thiserror::Error;

// ==========================================
// GateError - 闸门判定错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("不存在的状态迁移: {from} → {to}")]
    UnknownTransition { from: DealStatus, to: DealStatus },

    #[error("前置条件不满足: {from} → {to}, 缺失: {}", format_missing(.missing))]
    MissingRequirements {
        from: DealStatus,
        to: DealStatus,
        missing: Vec<FactKey>,
    },
}

fn format_missing(missing: &[FactKey]) -> String {
    missing
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl GateError {
    /// 缺失事实名称 (UnknownTransition 时为空)
    pub fn missing_names(&self) -> Vec<&'static str> {
        match self {
            GateError::MissingRequirements { missing, .. } => {
                missing.iter().map(|k| k.as_str()).collect()
            }
            GateError::UnknownTransition { .. } => Vec::new(),
        }
    }
}

// ==========================================
// Gate - 单个闸门定义
// ==========================================
/// 审计消息构造函数 (仅在闸门通过时调用)
pub type AuditBuilder = fn(&DealFacts) -> String;

#[derive(Clone, Copy)]
pub struct Gate {
    pub from: DealStatus,
    pub to: DealStatus,
    pub required: &'static [FactKey],
    audit: AuditBuilder,
}

impl Gate {
    /// 前置条件检查, 按声明顺序返回全部缺失事实 (空 = 满足)
    pub fn check(&self, facts: &DealFacts) -> Vec<FactKey> {
        self.required
            .iter()
            .copied()
            .filter(|key| !facts.is_satisfied(*key))
            .collect()
    }

    pub fn audit_message(&self, facts: &DealFacts) -> String {
        (self.audit)(facts)
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("required", &self.required)
            .finish()
    }
}

// ==========================================
// 审计消息
// ==========================================

fn text_or_dash(facts: &DealFacts, key: FactKey) -> &str {
    facts.text(key).map(str::trim).unwrap_or("-")
}

fn audit_quote_accepted(facts: &DealFacts) -> String {
    format!(
        "报价已接受: quoteId={}, Pricelock 已锁定, 客户已确认",
        text_or_dash(facts, FactKey::QuoteId)
    )
}

fn audit_agreement(facts: &DealFacts) -> String {
    let window = facts
        .window(FactKey::AgreementWindow)
        .map(|w| format!("{}~{}", w.start, w.end))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "原则性协议达成: contractRef={}, 协议期={}, 范围={}",
        text_or_dash(facts, FactKey::ContractRef),
        window,
        text_or_dash(facts, FactKey::ScopeSummary)
    )
}

fn audit_order_committed(facts: &DealFacts) -> String {
    format!(
        "订单已确认(不可回退): PO={}, SO={}, 订舱单={}",
        text_or_dash(facts, FactKey::PoNumber),
        text_or_dash(facts, FactKey::SoNumber),
        text_or_dash(facts, FactKey::BookingSheetRef)
    )
}

fn audit_documented(facts: &DealFacts) -> String {
    let docs = facts.documents();
    let verified = docs.iter().filter(|d| d.verified).count();
    format!("单据齐备: 共 {} 份, 已核验 {} 份", docs.len(), verified)
}

fn audit_active(_facts: &DealFacts) -> String {
    "订单进入执行".to_string()
}

fn audit_reported(facts: &DealFacts) -> String {
    format!("执行报告已提交: reportRef={}", text_or_dash(facts, FactKey::ReportRef))
}

fn audit_invoiced(facts: &DealFacts) -> String {
    format!("已开票: invoiceNumber={}", text_or_dash(facts, FactKey::InvoiceNumber))
}

fn audit_closed(_facts: &DealFacts) -> String {
    "交易已关闭".to_string()
}

fn audit_cancelled(facts: &DealFacts) -> String {
    format!(
        "交易已取消: 原因={}",
        text_or_dash(facts, FactKey::CancellationReason)
    )
}

// ==========================================
// 闸门表 (有向无环)
// ==========================================
const CANCEL_REQUIRES: &[FactKey] = &[FactKey::CancellationReason];

static GATES: &[Gate] = &[
    Gate {
        from: DealStatus::Lead,
        to: DealStatus::QuoteAccepted,
        required: &[FactKey::QuoteId, FactKey::PriceLocked, FactKey::Confirmed],
        audit: audit_quote_accepted,
    },
    Gate {
        from: DealStatus::QuoteAccepted,
        to: DealStatus::AgreementInPrinciple,
        required: &[
            FactKey::ContractRef,
            FactKey::AgreementWindow,
            FactKey::ScopeSummary,
        ],
        audit: audit_agreement,
    },
    Gate {
        from: DealStatus::AgreementInPrinciple,
        to: DealStatus::OrderCommitted,
        required: &[FactKey::PoNumber, FactKey::SoNumber, FactKey::BookingSheetRef],
        audit: audit_order_committed,
    },
    Gate {
        from: DealStatus::OrderCommitted,
        to: DealStatus::Documented,
        required: &[FactKey::Documents],
        audit: audit_documented,
    },
    Gate {
        from: DealStatus::Documented,
        to: DealStatus::Active,
        required: &[],
        audit: audit_active,
    },
    Gate {
        from: DealStatus::Active,
        to: DealStatus::Reported,
        required: &[FactKey::ReportRef],
        audit: audit_reported,
    },
    Gate {
        from: DealStatus::Reported,
        to: DealStatus::Invoiced,
        required: &[FactKey::InvoiceNumber],
        audit: audit_invoiced,
    },
    Gate {
        from: DealStatus::Invoiced,
        to: DealStatus::Closed,
        required: &[],
        audit: audit_closed,
    },
    // 取消: 执行前任一阶段
    Gate {
        from: DealStatus::Lead,
        to: DealStatus::Cancelled,
        required: CANCEL_REQUIRES,
        audit: audit_cancelled,
    },
    Gate {
        from: DealStatus::QuoteAccepted,
        to: DealStatus::Cancelled,
        required: CANCEL_REQUIRES,
        audit: audit_cancelled,
    },
    Gate {
        from: DealStatus::AgreementInPrinciple,
        to: DealStatus::Cancelled,
        required: CANCEL_REQUIRES,
        audit: audit_cancelled,
    },
    Gate {
        from: DealStatus::OrderCommitted,
        to: DealStatus::Cancelled,
        required: CANCEL_REQUIRES,
        audit: audit_cancelled,
    },
    Gate {
        from: DealStatus::Documented,
        to: DealStatus::Cancelled,
        required: CANCEL_REQUIRES,
        audit: audit_cancelled,
    },
];

// ==========================================
// GateController - 闸门控制器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct GateController;

impl GateController {
    pub fn new() -> Self {
        Self
    }

    /// 判定状态迁移
    ///
    /// # 参数
    /// - `current`: 交易当前状态
    /// - `target`: 请求的目标状态
    /// - `facts`: 已收集的事实包
    ///
    /// # 返回
    /// - `Ok(audit_message)`: 闸门通过, 调用方负责持久化新状态并追加审计消息
    /// - `Err(UnknownTransition)`: 无此闸门 (含跳级、回退、终止态出发)
    /// - `Err(MissingRequirements)`: 闸门存在但事实不全, 列出全部缺失项
    pub fn evaluate_transition(
        &self,
        current: DealStatus,
        target: DealStatus,
        facts: &DealFacts,
    ) -> Result<String, GateError> {
        let gate = self
            .gate_for(current, target)
            .ok_or(GateError::UnknownTransition {
                from: current,
                to: target,
            })?;

        let missing = gate.check(facts);
        if !missing.is_empty() {
            return Err(GateError::MissingRequirements {
                from: current,
                to: target,
                missing,
            });
        }

        Ok(gate.audit_message(facts))
    }

    /// 查找闸门定义
    pub fn gate_for(&self, from: DealStatus, to: DealStatus) -> Option<&'static Gate> {
        GATES.iter().find(|g| g.from == from && g.to == to)
    }

    /// 从某状态出发的合法目标 (按闸门表顺序)
    pub fn targets_from(&self, from: DealStatus) -> Vec<DealStatus> {
        GATES
            .iter()
            .filter(|g| g.from == from)
            .map(|g| g.to)
            .collect()
    }

    /// 全部闸门
    pub fn gates(&self) -> &'static [Gate] {
        GATES
    }
}

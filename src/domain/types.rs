// ==========================================
// OBARI 生命周期引擎 - 领域类型定义
// ==========================================
// 职责: 交易状态、方向、周期槽位、运输分类等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 交易状态 (Deal Status)
// ==========================================
// 红线: 只能通过闸门前进,不允许直接赋值
// 顺序: Lead < QuoteAccepted < ... < Closed; Cancelled 为终止态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    Lead,                 // 线索
    QuoteAccepted,        // 报价已接受
    AgreementInPrinciple, // 原则性协议
    OrderCommitted,       // 订单已确认(不可回退点)
    Documented,           // 单据齐备
    Active,               // 执行中
    Reported,             // 已报告
    Invoiced,             // 已开票
    Closed,               // 已关闭
    Cancelled,            // 已取消
}

impl DealStatus {
    pub const ALL: [DealStatus; 10] = [
        DealStatus::Lead,
        DealStatus::QuoteAccepted,
        DealStatus::AgreementInPrinciple,
        DealStatus::OrderCommitted,
        DealStatus::Documented,
        DealStatus::Active,
        DealStatus::Reported,
        DealStatus::Invoiced,
        DealStatus::Closed,
        DealStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Lead => "LEAD",
            DealStatus::QuoteAccepted => "QUOTE_ACCEPTED",
            DealStatus::AgreementInPrinciple => "AGREEMENT_IN_PRINCIPLE",
            DealStatus::OrderCommitted => "ORDER_COMMITTED",
            DealStatus::Documented => "DOCUMENTED",
            DealStatus::Active => "ACTIVE",
            DealStatus::Reported => "REPORTED",
            DealStatus::Invoiced => "INVOICED",
            DealStatus::Closed => "CLOSED",
            DealStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从字符串解析状态（大小写不敏感，未知值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL.iter().copied().find(|st| st.as_str() == upper)
    }

    /// 流水线中的位次（Cancelled 与 Closed 同为终点）
    pub fn rank(&self) -> u8 {
        match self {
            DealStatus::Lead => 0,
            DealStatus::QuoteAccepted => 1,
            DealStatus::AgreementInPrinciple => 2,
            DealStatus::OrderCommitted => 3,
            DealStatus::Documented => 4,
            DealStatus::Active => 5,
            DealStatus::Reported => 6,
            DealStatus::Invoiced => 7,
            DealStatus::Closed | DealStatus::Cancelled => 8,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Closed | DealStatus::Cancelled)
    }

    /// 是否已越过订单确认闸门（条款已冻结）
    pub fn is_committed(&self) -> bool {
        !matches!(self, DealStatus::Cancelled) && self.rank() >= DealStatus::OrderCommitted.rank()
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 订单方向 (Order Direction)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,  // 采购入库
    Outbound, // 销售出库
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "INBOUND",
            Direction::Outbound => "OUTBOUND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "INBOUND" => Some(Direction::Inbound),
            "OUTBOUND" => Some(Direction::Outbound),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 库存流水方向 (Stock Movement Direction)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "IN",
            StockDirection::Out => "OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IN" => Some(StockDirection::In),
            "OUT" => Some(StockDirection::Out),
            _ => None,
        }
    }
}

impl fmt::Display for StockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 周期槽位 (Week Slot)
// ==========================================
// 四个 7 天槽位循环: W1 → W2 → W3 → W4 → W1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeekSlot {
    W1,
    W2,
    W3,
    W4,
}

impl WeekSlot {
    pub const ALL: [WeekSlot; 4] = [WeekSlot::W1, WeekSlot::W2, WeekSlot::W3, WeekSlot::W4];

    /// 0 基序号
    pub fn index(&self) -> u32 {
        match self {
            WeekSlot::W1 => 0,
            WeekSlot::W2 => 1,
            WeekSlot::W3 => 2,
            WeekSlot::W4 => 3,
        }
    }

    /// 任意周序号取模映射为槽位
    pub fn from_index(index: u32) -> Self {
        Self::ALL[(index % 4) as usize]
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeekSlot::W1 => "W1",
            WeekSlot::W2 => "W2",
            WeekSlot::W3 => "W3",
            WeekSlot::W4 => "W4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "W1" => Some(WeekSlot::W1),
            "W2" => Some(WeekSlot::W2),
            "W3" => Some(WeekSlot::W3),
            "W4" => Some(WeekSlot::W4),
            _ => None,
        }
    }
}

impl fmt::Display for WeekSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 周期类型 (Cadence Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CadenceKind {
    Weekly,     // 每周执行
    FourWeekly, // 每 28 天在同一槽位执行
}

impl CadenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CadenceKind::Weekly => "WEEKLY",
            CadenceKind::FourWeekly => "FOUR_WEEKLY",
        }
    }
}

impl fmt::Display for CadenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 运输分类 (Transport Classification)
// ==========================================
// 由草稿运输字段派生,不接受外部直接指定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportClass {
    QuotedIn,       // 运费含在报价中
    VendorArranged, // 供方安排
    ClientArranged, // 客户自提/自行安排
}

impl TransportClass {
    /// 报表用短码
    pub fn code(&self) -> &'static str {
        match self {
            TransportClass::QuotedIn => "TQ",
            TransportClass::VendorArranged => "TV",
            TransportClass::ClientArranged => "TC",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportClass::QuotedIn => "QUOTED_IN",
            TransportClass::VendorArranged => "VENDOR_ARRANGED",
            TransportClass::ClientArranged => "CLIENT_ARRANGED",
        }
    }
}

impl fmt::Display for TransportClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 快照状态 (Snapshot Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    Staging, // 暂存,待下游订舱引用
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Staging => "STAGING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STAGING" => Some(SnapshotStatus::Staging),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deal_status_parse_roundtrip() {
        for status in DealStatus::ALL {
            assert_eq!(DealStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DealStatus::parse("quote_accepted"), Some(DealStatus::QuoteAccepted));
        assert_eq!(DealStatus::parse("BOOKED"), None);
    }

    #[test]
    fn test_deal_status_rank_and_terminal() {
        assert!(DealStatus::Lead.rank() < DealStatus::OrderCommitted.rank());
        assert!(DealStatus::Closed.is_terminal());
        assert!(DealStatus::Cancelled.is_terminal());
        assert!(!DealStatus::Active.is_terminal());
        assert!(DealStatus::Documented.is_committed());
        assert!(!DealStatus::Cancelled.is_committed());
        assert!(!DealStatus::AgreementInPrinciple.is_committed());
    }

    #[test]
    fn test_week_slot_cycle() {
        assert_eq!(WeekSlot::W4.next(), WeekSlot::W1);
        assert_eq!(WeekSlot::from_index(6), WeekSlot::W3);
        assert_eq!(WeekSlot::parse("w2"), Some(WeekSlot::W2));
        assert_eq!(WeekSlot::parse("W5"), None);
    }

    #[test]
    fn test_week_slot_four_steps_return_home() {
        for slot in WeekSlot::ALL {
            let mut walked = slot;
            let mut seen = Vec::new();
            for _ in 0..4 {
                walked = walked.next();
                seen.push(walked);
            }
            assert_eq!(walked, slot);
            // 四步恰好经过每个槽位一次
            seen.sort_by_key(|s| s.index());
            assert_eq!(seen, WeekSlot::ALL.to_vec());
        }
    }

    #[test]
    fn test_serde_format() {
        let json = serde_json::to_string(&DealStatus::AgreementInPrinciple).unwrap();
        assert_eq!(json, "\"AGREEMENT_IN_PRINCIPLE\"");
        let json = serde_json::to_string(&TransportClass::VendorArranged).unwrap();
        assert_eq!(json, "\"VENDOR_ARRANGED\"");
    }
}

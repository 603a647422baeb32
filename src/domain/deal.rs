// ==========================================
// OBARI 生命周期引擎 - 交易领域模型
// ==========================================
// 职责: 交易头 + 类型化事实包 (fact bag)
// 红线: 事实只增不删; 状态只能经闸门推进
// ==========================================

use crate::domain::types::{DealStatus, Direction};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ==========================================
// FactKey - 事实名称 (封闭枚举)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactKey {
    QuoteId,
    PriceLocked,
    Confirmed,
    ContractRef,
    AgreementWindow,
    ScopeSummary,
    PoNumber,
    SoNumber,
    BookingSheetRef,
    Documents,
    ReportRef,
    InvoiceNumber,
    CancellationReason,
}

/// 事实值的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    Text,
    Flag,
    Window,
    Documents,
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FactKind::Text => "text",
            FactKind::Flag => "flag",
            FactKind::Window => "window",
            FactKind::Documents => "documents",
        };
        write!(f, "{}", s)
    }
}

impl FactKey {
    pub const ALL: [FactKey; 13] = [
        FactKey::QuoteId,
        FactKey::PriceLocked,
        FactKey::Confirmed,
        FactKey::ContractRef,
        FactKey::AgreementWindow,
        FactKey::ScopeSummary,
        FactKey::PoNumber,
        FactKey::SoNumber,
        FactKey::BookingSheetRef,
        FactKey::Documents,
        FactKey::ReportRef,
        FactKey::InvoiceNumber,
        FactKey::CancellationReason,
    ];

    /// 对外名称 (表单/JSON 字段名)
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKey::QuoteId => "quoteId",
            FactKey::PriceLocked => "priceLocked",
            FactKey::Confirmed => "confirmed",
            FactKey::ContractRef => "contractRef",
            FactKey::AgreementWindow => "agreementWindow",
            FactKey::ScopeSummary => "scopeSummary",
            FactKey::PoNumber => "poNumber",
            FactKey::SoNumber => "soNumber",
            FactKey::BookingSheetRef => "bookingSheetRef",
            FactKey::Documents => "documents",
            FactKey::ReportRef => "reportRef",
            FactKey::InvoiceNumber => "invoiceNumber",
            FactKey::CancellationReason => "cancellationReason",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    pub fn kind(&self) -> FactKind {
        match self {
            FactKey::PriceLocked | FactKey::Confirmed => FactKind::Flag,
            FactKey::AgreementWindow => FactKind::Window,
            FactKey::Documents => FactKind::Documents,
            _ => FactKind::Text,
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// FactValue - 事实值
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub doc_id: String,
    pub name: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactValue {
    Text(String),
    Flag(bool),
    Window(AgreementWindow),
    Documents(Vec<DocumentRef>),
}

impl FactValue {
    pub fn kind(&self) -> FactKind {
        match self {
            FactValue::Text(_) => FactKind::Text,
            FactValue::Flag(_) => FactKind::Flag,
            FactValue::Window(_) => FactKind::Window,
            FactValue::Documents(_) => FactKind::Documents,
        }
    }

    /// 是否构成"已满足"的证据
    ///
    /// - 文本: 去空白后非空
    /// - 开关: 必须显式为 true
    /// - 时间窗: start <= end
    /// - 单据: 至少一份已核验
    pub fn is_satisfied(&self) -> bool {
        match self {
            FactValue::Text(s) => !s.trim().is_empty(),
            FactValue::Flag(b) => *b,
            FactValue::Window(w) => w.start <= w.end,
            FactValue::Documents(docs) => docs.iter().any(|d| d.verified),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            FactValue::Text(s) => JsonValue::String(s.clone()),
            FactValue::Flag(b) => JsonValue::Bool(*b),
            FactValue::Window(w) => serde_json::to_value(w).unwrap_or(JsonValue::Null),
            FactValue::Documents(docs) => serde_json::to_value(docs).unwrap_or(JsonValue::Null),
        }
    }

    fn from_json(key: FactKey, value: &JsonValue) -> Result<Self, FactError> {
        let wrong_kind = || FactError::WrongKind {
            key,
            expected: key.kind(),
        };
        match key.kind() {
            FactKind::Text => match value {
                JsonValue::String(s) => Ok(FactValue::Text(s.clone())),
                JsonValue::Number(n) => Ok(FactValue::Text(n.to_string())),
                _ => Err(wrong_kind()),
            },
            FactKind::Flag => value.as_bool().map(FactValue::Flag).ok_or_else(wrong_kind),
            FactKind::Window => serde_json::from_value::<AgreementWindow>(value.clone())
                .map(FactValue::Window)
                .map_err(|_| wrong_kind()),
            FactKind::Documents => serde_json::from_value::<Vec<DocumentRef>>(value.clone())
                .map(FactValue::Documents)
                .map_err(|_| wrong_kind()),
        }
    }
}

// ==========================================
// FactError - 事实写入错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("事实类型不匹配: key={key}, expected={expected}")]
    WrongKind { key: FactKey, expected: FactKind },

    #[error("事实包必须是 JSON 对象")]
    NotAnObject,

    #[error("事实已确认, 不能改写: key={key}")]
    AlreadySettled { key: FactKey },

    #[error("已核验单据不能改写: doc_id={doc_id}")]
    DocumentSettled { doc_id: String },
}

// ==========================================
// DealFacts - 事实包
// ==========================================
// 已知键进入类型化 map; 未识别键原样保留在 extra 中(前向兼容)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealFacts {
    known: BTreeMap<FactKey, FactValue>,
    extra: BTreeMap<String, JsonValue>,
}

impl DealFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个已知事实,校验值类型
    pub fn insert(&mut self, key: FactKey, value: FactValue) -> Result<(), FactError> {
        if value.kind() != key.kind() {
            return Err(FactError::WrongKind {
                key,
                expected: key.kind(),
            });
        }
        self.known.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: FactKey) -> Option<&FactValue> {
        self.known.get(&key)
    }

    pub fn text(&self, key: FactKey) -> Option<&str> {
        match self.known.get(&key) {
            Some(FactValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, key: FactKey) -> Option<bool> {
        match self.known.get(&key) {
            Some(FactValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn window(&self, key: FactKey) -> Option<&AgreementWindow> {
        match self.known.get(&key) {
            Some(FactValue::Window(w)) => Some(w),
            _ => None,
        }
    }

    pub fn documents(&self) -> &[DocumentRef] {
        match self.known.get(&FactKey::Documents) {
            Some(FactValue::Documents(docs)) => docs.as_slice(),
            _ => &[],
        }
    }

    pub fn is_satisfied(&self, key: FactKey) -> bool {
        self.known.get(&key).map(FactValue::is_satisfied).unwrap_or(false)
    }

    pub fn extra(&self) -> &BTreeMap<String, JsonValue> {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.extra.is_empty()
    }

    /// 合并新提交的事实 (只增不删)
    ///
    /// - 已知键: 旧值未满足时可被替换; 已满足的旧值只接受相同的值
    /// - 单据: 按 doc_id 并集; 已核验的单据不可改写
    /// - 未识别键: 覆盖写入 extra
    ///
    /// 失败时 self 保持不变
    pub fn merge(&mut self, incoming: &DealFacts) -> Result<(), FactError> {
        let mut known = self.known.clone();
        for (key, value) in &incoming.known {
            match (known.get_mut(key), value) {
                (Some(FactValue::Documents(existing)), FactValue::Documents(new_docs)) => {
                    merge_documents(existing, new_docs)?;
                }
                (Some(current), _) if current.is_satisfied() && *current != *value => {
                    return Err(FactError::AlreadySettled { key: *key });
                }
                _ => {
                    known.insert(*key, value.clone());
                }
            }
        }
        self.known = known;
        for (key, value) in &incoming.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    pub fn merged(&self, incoming: &DealFacts) -> Result<DealFacts, FactError> {
        let mut out = self.clone();
        out.merge(incoming)?;
        Ok(out)
    }

    /// 去掉某个已知键后的副本 (用于取代交易时丢弃取消原因)
    pub fn without(&self, key: FactKey) -> DealFacts {
        let mut out = self.clone();
        out.known.remove(&key);
        out
    }

    /// 从 JSON 对象解析 (表单提交 / 数据库存储格式)
    pub fn from_json(value: &JsonValue) -> Result<Self, FactError> {
        let map = value.as_object().ok_or(FactError::NotAnObject)?;
        Self::from_json_map(map)
    }

    pub fn from_json_map(map: &Map<String, JsonValue>) -> Result<Self, FactError> {
        let mut facts = DealFacts::new();
        for (name, value) in map {
            match FactKey::parse(name) {
                Some(key) => {
                    let parsed = FactValue::from_json(key, value)?;
                    facts.known.insert(key, parsed);
                }
                None => {
                    facts.extra.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(facts)
    }

    pub fn to_json_map(&self) -> Map<String, JsonValue> {
        let mut map = Map::new();
        for (name, value) in &self.extra {
            map.insert(name.clone(), value.clone());
        }
        for (key, value) in &self.known {
            map.insert(key.as_str().to_string(), value.to_json());
        }
        map
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_json_map())
    }
}

fn merge_documents(existing: &mut Vec<DocumentRef>, incoming: &[DocumentRef]) -> Result<(), FactError> {
    for doc in incoming {
        match existing.iter_mut().find(|d| d.doc_id == doc.doc_id) {
            Some(slot) if slot.verified && slot != doc => {
                return Err(FactError::DocumentSettled {
                    doc_id: doc.doc_id.clone(),
                });
            }
            Some(slot) => *slot = doc.clone(),
            None => existing.push(doc.clone()),
        }
    }
    Ok(())
}

impl Serialize for DealFacts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DealFacts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, JsonValue>::deserialize(deserializer)?;
        DealFacts::from_json_map(&map).map_err(D::Error::custom)
    }
}

// ==========================================
// DealOrigin - 交易来源
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealOrigin {
    Manual,
    Replenishment { intent_id: String },
}

impl DealOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealOrigin::Manual => "MANUAL",
            DealOrigin::Replenishment { .. } => "REPLENISHMENT",
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            DealOrigin::Manual => None,
            DealOrigin::Replenishment { intent_id } => Some(intent_id.as_str()),
        }
    }

    /// 从存储列 (origin, origin_ref) 还原
    pub fn from_columns(origin: &str, origin_ref: Option<String>) -> Option<Self> {
        match (origin, origin_ref) {
            ("MANUAL", _) => Some(DealOrigin::Manual),
            ("REPLENISHMENT", Some(intent_id)) => Some(DealOrigin::Replenishment { intent_id }),
            _ => None,
        }
    }
}

// ==========================================
// Deal - 交易头
// ==========================================
// 对齐: deal 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub deal_id: String,
    pub counterparty_ref: String,
    pub direction: Direction,
    pub status: DealStatus,
    pub facts: DealFacts,
    pub origin: DealOrigin,
    pub snapshot_id: Option<String>,  // 订单确认时锁定的暂存快照
    pub supersedes: Option<String>,   // 本交易取代的旧交易
    pub superseded_by: Option<String>,
    pub revision: i32,                // 乐观锁版本号
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Deal {
    /// 新建线索阶段的交易
    pub fn new_lead(
        counterparty_ref: &str,
        direction: Direction,
        origin: DealOrigin,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            deal_id: Uuid::new_v4().to_string(),
            counterparty_ref: counterparty_ref.trim().to_string(),
            direction,
            status: DealStatus::Lead,
            facts: DealFacts::new(),
            origin,
            snapshot_id: None,
            supersedes: None,
            superseded_by: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// OBARI 生命周期引擎 - 补货配置读取 Trait
// ==========================================
// 职责: 定义补货观察者所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;

// ==========================================
// ReplenishmentConfigReader Trait
// ==========================================
// 用途: 补货观察者所需的阈值读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ReplenishmentConfigReader: Send + Sync {
    /// 获取物料的再订货点
    ///
    /// # 参数
    /// - item_id: 物料编码
    ///
    /// # 返回
    /// - f64: 在库量不高于该值时触发补货
    ///
    /// # 默认值
    /// - 物料级配置优先, 其次全局配置, 均无时为 10
    fn reorder_point(&self, item_id: &str) -> RepositoryResult<f64>;

    /// 获取最小补货量
    ///
    /// # 默认值
    /// - 5
    fn minimum_floor(&self) -> RepositoryResult<f64>;

    /// 获取安全系数
    ///
    /// # 默认值
    /// - 1.2
    fn safety_factor(&self) -> RepositoryResult<f64>;

    /// 获取消耗统计的滑动窗口天数
    ///
    /// # 默认值
    /// - 28
    fn trailing_window_days(&self) -> RepositoryResult<i64>;
}

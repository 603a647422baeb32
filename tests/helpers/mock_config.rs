// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use obari_lifecycle::config::ReplenishmentConfigReader;
use obari_lifecycle::repository::RepositoryResult;
use std::collections::HashMap;

/// Mock 补货配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub reorder_point: f64,
    pub minimum_floor: f64,
    pub safety_factor: f64,
    pub trailing_window_days: i64,
    pub item_reorder_points: HashMap<String, f64>,
}

impl MockConfig {
    /// 创建默认配置 (与 ConfigManager 默认值一致)
    pub fn default() -> Self {
        Self {
            reorder_point: 10.0,
            minimum_floor: 5.0,
            safety_factor: 1.2,
            trailing_window_days: 28,
            item_reorder_points: HashMap::new(),
        }
    }

    pub fn with_item_reorder_point(mut self, item_id: &str, value: f64) -> Self {
        self.item_reorder_points.insert(item_id.to_string(), value);
        self
    }

    pub fn with_safety_factor(mut self, value: f64) -> Self {
        self.safety_factor = value;
        self
    }
}

impl ReplenishmentConfigReader for MockConfig {
    fn reorder_point(&self, item_id: &str) -> RepositoryResult<f64> {
        Ok(self
            .item_reorder_points
            .get(item_id)
            .copied()
            .unwrap_or(self.reorder_point))
    }

    fn minimum_floor(&self) -> RepositoryResult<f64> {
        Ok(self.minimum_floor)
    }

    fn safety_factor(&self) -> RepositoryResult<f64> {
        Ok(self.safety_factor)
    }

    fn trailing_window_days(&self) -> RepositoryResult<i64> {
        Ok(self.trailing_window_days)
    }
}

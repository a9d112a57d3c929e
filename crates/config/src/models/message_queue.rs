use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 进程内消息代理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// 单条通道最多积压的消息数，0 表示不限
    pub max_lane_depth: usize,
    /// 投递后未确认的消息在该时长后重新投递
    pub visibility_timeout_ms: u64,
    /// 超过该重投次数后进入死信
    pub max_redeliveries: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_lane_depth: 0,
            visibility_timeout_ms: 30_000,
            max_redeliveries: 3,
        }
    }
}

impl BrokerConfig {
    pub fn visibility_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.visibility_timeout_ms)
    }
}

impl ConfigValidator for BrokerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive_millis(
            self.visibility_timeout_ms,
            "broker.visibility_timeout_ms",
        )?;
        Ok(())
    }
}

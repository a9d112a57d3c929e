use crate::validation::ConfigValidator;
use serde::{Deserialize, Serialize};

/// 启动时写入的演示任务
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixturesConfig {
    pub seed_count: usize,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self { seed_count: 50 }
    }
}

impl ConfigValidator for FixturesConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.seed_count > 100_000 {
            return Err(crate::ConfigError::Validation(
                "fixtures.seed_count must be less than or equal to 100000".to_string(),
            ));
        }
        Ok(())
    }
}

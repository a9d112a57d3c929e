use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub workers_per_lane: usize,
    pub poll_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers_per_lane: 2,
            poll_timeout_ms: 500,
        }
    }
}

impl WorkerConfig {
    pub fn poll_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_timeout_ms)
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.workers_per_lane, "worker.workers_per_lane", 64)?;
        ValidationUtils::validate_positive_millis(self.poll_timeout_ms, "worker.poll_timeout_ms")?;
        Ok(())
    }
}

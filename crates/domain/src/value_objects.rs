use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use taskhub_errors::TaskHubError;

/// 缺省优先级：缺失 priority 的任务按此值分类，落在 Normal 档
pub const DEFAULT_PRIORITY: i64 = 2;

const HIGH_THRESHOLD: i64 = 3;
const LOW_THRESHOLD: i64 = 1;

/// 优先级档位，由存储中的整数优先级推导，永不持久化
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityTier {
    Low,
    Normal,
    High,
}

impl PriorityTier {
    /// 整数优先级到档位的全函数映射：`>= 3` 为 High，`<= 1` 为 Low，其余为 Normal
    pub fn classify(priority: i64) -> Self {
        if priority >= HIGH_THRESHOLD {
            PriorityTier::High
        } else if priority <= LOW_THRESHOLD {
            PriorityTier::Low
        } else {
            PriorityTier::Normal
        }
    }

    /// 缺失的优先级先补成 [`DEFAULT_PRIORITY`] 再分类
    pub fn resolve(priority: Option<i64>) -> Self {
        Self::classify(priority.unwrap_or(DEFAULT_PRIORITY))
    }

    pub fn lane(&self) -> Lane {
        match self {
            PriorityTier::Low => Lane::Low,
            PriorityTier::Normal => Lane::Default,
            PriorityTier::High => Lane::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Low => "LOW",
            PriorityTier::Normal => "NORMAL",
            PriorityTier::High => "HIGH",
        }
    }
}

/// `PriorityTier::classify` 的自由函数形式
pub fn classify(priority: i64) -> PriorityTier {
    PriorityTier::classify(priority)
}

/// Broker 中的投递通道，与优先级档位一一对应
///
/// 通道集合是封闭的：核心之外的调用方只能使用这三个通道。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    #[serde(rename = "async_high")]
    High,
    #[serde(rename = "async")]
    Default,
    #[serde(rename = "async_low")]
    Low,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::High, Lane::Default, Lane::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::High => "async_high",
            Lane::Default => "async",
            Lane::Low => "async_low",
        }
    }

    pub fn tier(&self) -> PriorityTier {
        match self {
            Lane::High => PriorityTier::High,
            Lane::Default => PriorityTier::Normal,
            Lane::Low => PriorityTier::Low,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = TaskHubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "async_high" => Ok(Lane::High),
            "async" => Ok(Lane::Default),
            "async_low" => Ok(Lane::Low),
            other => Err(TaskHubError::config_error(format!("未知的投递通道: {other}"))),
        }
    }
}

use serde::Serialize;
use std::collections::BTreeMap;
use taskhub_domain::entities::TaskId;
use taskhub_domain::value_objects::Lane;

/// 单行分发失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub task_id: TaskId,
    pub lane: Lane,
    pub error: String,
}

/// 批量分发结果
///
/// 批量分发不是事务性的：失败的行不会回滚之前已发布的消息。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// 成功发布的消息数
    pub dispatched: usize,
    /// 按输入顺序记录的成功发布通道
    pub lanes: Vec<Lane>,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.dispatched + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// 每个通道成功发布的消息数
    pub fn lane_counts(&self) -> BTreeMap<Lane, usize> {
        let mut counts = BTreeMap::new();
        for lane in &self.lanes {
            *counts.entry(*lane).or_insert(0) += 1;
        }
        counts
    }

    pub(crate) fn record_success(&mut self, lane: Lane) {
        self.dispatched += 1;
        self.lanes.push(lane);
    }

    pub(crate) fn record_failure(&mut self, task_id: TaskId, lane: Lane, error: String) {
        self.failures.push(DispatchFailure {
            task_id,
            lane,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report = DispatchReport::default();
        report.record_success(Lane::High);
        report.record_success(Lane::Low);
        report.record_success(Lane::High);
        report.record_failure(4, Lane::Default, "down".to_string());

        assert_eq!(report.attempted(), 4);
        assert!(!report.is_complete());
        assert_eq!(report.lane_counts().get(&Lane::High), Some(&2));
        assert_eq!(report.lane_counts().get(&Lane::Default), None);
    }
}

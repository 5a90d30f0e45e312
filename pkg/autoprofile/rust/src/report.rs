// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use async_trait::async_trait;

use crate::error::BoxError;

/// CPU usage annotation attached to a report: both values are fractions of
/// the CPU quota.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuUsageInfo {
    pub threshold: f64,
    pub usage: f64,
}

impl CpuUsageInfo {
    pub fn threshold_percentage(&self) -> f64 {
        self.threshold * 100.0
    }

    pub fn usage_percentage(&self) -> f64 {
        self.usage * 100.0
    }
}

/// Memory usage annotation: fractions of the memory limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemUsageInfo {
    pub threshold: f64,
    pub usage: f64,
}

impl MemUsageInfo {
    pub fn threshold_percentage(&self) -> f64 {
        self.threshold * 100.0
    }

    pub fn usage_percentage(&self) -> f64 {
        self.usage * 100.0
    }
}

/// Task count annotation: absolute counts, not fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskUsageInfo {
    pub threshold: usize,
    pub count: usize,
}

/// Ships a captured profile artifact to its destination (a chat channel, an
/// object store, a local spool directory).
///
/// Each call is wrapped in a short deadline by the watch loop, so a hung
/// destination cannot stall sampling; a reporting error is logged by the
/// caller and never retried.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report_cpu_profile(&self, profile: &[u8], info: CpuUsageInfo)
        -> Result<(), BoxError>;

    async fn report_heap_profile(&self, profile: &[u8], info: MemUsageInfo)
        -> Result<(), BoxError>;

    async fn report_task_profile(&self, profile: &[u8], info: TaskUsageInfo)
        -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_info_percentages() {
        let ci = CpuUsageInfo {
            threshold: 0.75,
            usage: 0.825,
        };
        assert!((ci.threshold_percentage() - 75.0).abs() < 1e-9);
        assert!((ci.usage_percentage() - 82.5).abs() < 1e-9);

        let mi = MemUsageInfo {
            threshold: 0.9,
            usage: 0.5,
        };
        assert!((mi.threshold_percentage() - 90.0).abs() < 1e-9);
        assert!((mi.usage_percentage() - 50.0).abs() < 1e-9);
    }
}

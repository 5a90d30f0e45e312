// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Legacy single-hierarchy (cgroup v1) reader.
//!
//! Each controller lives in its own subtree: CPU quota under `cpu/`, the
//! cumulative usage counter under `cpuacct/`, memory accounting under
//! `memory/`. The reader is rooted at the hierarchy root, which inside a
//! container is the container's own group.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::{
    CgroupReader, missing_stat_key, read_file, read_scalar, stat_value, window_fraction,
    CPU_SNAPSHOT_WINDOW,
};
use crate::error::Error;
use crate::snapshot::{SnapshotRing, UsageSnapshot};

/// `cpuacct.usage` reports cumulative usage in nanoseconds.
const USAGE_UNIT: Duration = Duration::from_nanos(1);

pub(crate) struct CgroupV1 {
    dir: PathBuf,
    cpu_quota: f64,
    ring: SnapshotRing,
}

impl CgroupV1 {
    pub(crate) fn new(mount_point: &Path) -> Self {
        Self {
            dir: mount_point.to_path_buf(),
            cpu_quota: 0.0,
            ring: SnapshotRing::with_capacity(CPU_SNAPSHOT_WINDOW),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_snapshot_capacity(mut self, capacity: usize) -> Self {
        self.ring = SnapshotRing::with_capacity(capacity);
        self
    }
}

impl CgroupReader for CgroupV1 {
    fn load_cpu_quota(&mut self) -> Result<(), Error> {
        let quota_path = self.dir.join("cpu/cpu.cfs_quota_us");
        if !quota_path.is_file() {
            return Err(Error::CpuQuotaUndefined);
        }
        let quota: i64 = read_scalar(&quota_path)?;
        if quota < 0 {
            // -1 means the scheduler runs this group unconstrained.
            return Err(Error::CpuQuotaUndefined);
        }
        let period_path = self.dir.join("cpu/cpu.cfs_period_us");
        let period: u64 = read_scalar(&period_path)?;
        if period == 0 {
            return Err(Error::MalformedCgroupFile {
                path: period_path,
                reason: "zero period".to_string(),
            });
        }

        self.cpu_quota = quota as f64 / period as f64;
        Ok(())
    }

    fn cpu_usage(&mut self) -> Result<f64, Error> {
        let usage: u64 = read_scalar(&self.dir.join("cpuacct/cpuacct.usage"))?;
        self.ring.push(UsageSnapshot {
            usage,
            taken_at: Instant::now(),
        });

        // Usage is only meaningful once enough snapshots span the window.
        if !self.ring.is_full() {
            return Ok(0.0);
        }
        Ok(window_fraction(&self.ring, USAGE_UNIT, self.cpu_quota))
    }

    fn mem_usage(&mut self) -> Result<f64, Error> {
        let usage: u64 = read_scalar(&self.dir.join("memory/memory.usage_in_bytes"))?;
        let stat_path = self.dir.join("memory/memory.stat");
        let stat = read_file(&stat_path)?;
        let inactive_file = stat_value(&stat, "total_inactive_file")
            .ok_or_else(|| missing_stat_key(&stat_path, "total_inactive_file"))?;
        let limit = stat_value(&stat, "hierarchical_memory_limit")
            .ok_or_else(|| missing_stat_key(&stat_path, "hierarchical_memory_limit"))?;

        let working_set = usage.saturating_sub(inactive_file);
        Ok(working_set as f64 / limit as f64)
    }
}

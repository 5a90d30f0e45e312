// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Cgroup-backed resource usage readers.
//!
//! Two incompatible accounting layouts exist in the wild: the legacy
//! per-controller hierarchy (`/sys/fs/cgroup/cpu`, `/sys/fs/cgroup/memory`)
//! and the unified hierarchy (a single tree with `cpu.stat`, `memory.current`
//! and friends). The layout is probed once at startup and the matching reader
//! is constructed; the per-tick paths never branch on it.

mod v1;
mod v2;

pub(crate) use v1::CgroupV1;
pub(crate) use v2::CgroupV2;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::snapshot::SnapshotRing;

pub(crate) const DEFAULT_MOUNT_POINT: &str = "/sys/fs/cgroup";

/// Ring capacity for CPU usage snapshots. At the default 5s watch interval
/// this spans a two minute smoothing window.
pub(crate) const CPU_SNAPSHOT_WINDOW: usize = 24;

/// Uniform interface over the two accounting layouts.
///
/// A reader instance is single-writer by contract: `cpu_usage` mutates the
/// snapshot ring, so concurrent callers must bring their own lock.
pub(crate) trait CgroupReader: Send {
    /// Discover and cache the CPU quota as a fraction of one full core.
    /// Called once at startup; `cpu_usage` divides by the cached value.
    fn load_cpu_quota(&mut self) -> Result<(), Error>;

    /// Fraction of the CPU quota consumed over the sampling window.
    /// Returns 0.0 until the snapshot ring has filled once.
    fn cpu_usage(&mut self) -> Result<f64, Error>;

    /// Point-in-time fraction of the memory limit held by the working set
    /// (resident usage minus reclaimable file-backed pages).
    fn mem_usage(&mut self) -> Result<f64, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    Legacy,
    Unified,
}

/// Probe which accounting layout the kernel exposes at `mount_point`.
///
/// A hybrid mount (legacy controllers plus an empty unified subtree) keeps
/// its resource accounting on the legacy controllers, so it probes as
/// `Legacy` here.
pub(crate) fn probe_layout(mount_point: &Path) -> Result<Layout, Error> {
    if mount_point.join("cgroup.controllers").is_file() {
        return Ok(Layout::Unified);
    }
    if mount_point.join("cpu").is_dir() || mount_point.join("memory").is_dir() {
        return Ok(Layout::Legacy);
    }
    Err(Error::CgroupsUnavailable)
}

/// Construct the reader matching the detected layout.
///
/// `group_path` overrides the unified-layout group directory; when `None`
/// the calling process's own group is resolved from `/proc/self/cgroup`.
/// The legacy reader always uses the hierarchy root.
pub(crate) fn detect(
    mount_point: &Path,
    group_path: Option<&str>,
) -> Result<Box<dyn CgroupReader>, Error> {
    match probe_layout(mount_point)? {
        Layout::Unified => {
            let reader = match group_path {
                Some(group) => CgroupV2::with_group_path(mount_point, group),
                None => CgroupV2::new(mount_point)?,
            };
            Ok(Box::new(reader))
        }
        Layout::Legacy => Ok(Box::new(CgroupV1::new(mount_point))),
    }
}

/// Usage as a fraction of quota over the window the ring spans:
/// `(delta consumed / delta wall-clock) / quota`. `usage_unit` converts the
/// raw counter into time (nanoseconds for legacy, microseconds for unified).
pub(super) fn window_fraction(ring: &SnapshotRing, usage_unit: Duration, cpu_quota: f64) -> f64 {
    let (Some(first), Some(last)) = (ring.head(), ring.tail()) else {
        return 0.0;
    };
    let consumed = usage_unit.as_secs_f64() * last.usage.saturating_sub(first.usage) as f64;
    let elapsed = last.taken_at.duration_since(first.taken_at).as_secs_f64();
    if elapsed == 0.0 {
        return 0.0;
    }
    (consumed / elapsed) / cpu_quota
}

pub(super) fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a whole-file scalar such as `memory.current` or `cpu.cfs_quota_us`.
pub(super) fn read_scalar<T>(path: &Path) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let contents = read_file(path)?;
    let value = contents.trim();
    if value.is_empty() {
        return Err(Error::EmptyCgroupFile {
            path: path.to_path_buf(),
        });
    }
    value.parse().map_err(|e| Error::MalformedCgroupFile {
        path: path.to_path_buf(),
        reason: format!("{value:?}: {e}"),
    })
}

/// Look up a `key value` line in a flat stat file (`cpu.stat`, `memory.stat`).
pub(super) fn stat_value(contents: &str, key: &str) -> Option<u64> {
    contents.lines().find_map(|line| {
        let (k, v) = line.split_once(' ')?;
        if k != key {
            return None;
        }
        v.trim().parse().ok()
    })
}

pub(super) fn missing_stat_key(path: &Path, key: &str) -> Error {
    Error::MalformedCgroupFile {
        path: path.to_path_buf(),
        reason: format!("missing {key:?} entry"),
    }
}

pub(super) fn join_group(mount_point: &Path, group: &str) -> PathBuf {
    mount_point.join(group.trim_start_matches('/'))
}

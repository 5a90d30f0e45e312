// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Unified-hierarchy (cgroup v2) reader.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::{
    CgroupReader, join_group, missing_stat_key, read_file, read_scalar, stat_value,
    window_fraction, CPU_SNAPSHOT_WINDOW,
};
use crate::error::Error;
use crate::snapshot::{SnapshotRing, UsageSnapshot};

const SELF_CGROUP_FILE: &str = "/proc/self/cgroup";

/// Period applied when `cpu.max` carries a quota but omits the period field.
const CPU_MAX_DEFAULT_PERIOD: u64 = 100_000;

/// `cpu.stat` reports cumulative usage in microseconds.
const USAGE_UNIT: Duration = Duration::from_micros(1);

pub(crate) struct CgroupV2 {
    dir: PathBuf,
    cpu_quota: f64,
    ring: SnapshotRing,
}

impl CgroupV2 {
    /// Reader rooted at the calling process's own group, resolved from
    /// `/proc/self/cgroup`.
    pub(crate) fn new(mount_point: &Path) -> Result<Self, Error> {
        let contents = read_file(Path::new(SELF_CGROUP_FILE))?;
        let group = parse_unified_group(&contents).ok_or_else(|| Error::MalformedCgroupFile {
            path: PathBuf::from(SELF_CGROUP_FILE),
            reason: "no unified hierarchy entry".to_string(),
        })?;
        Ok(Self::with_group_path(mount_point, group))
    }

    pub(crate) fn with_group_path(mount_point: &Path, group: &str) -> Self {
        Self {
            dir: join_group(mount_point, group),
            cpu_quota: 0.0,
            ring: SnapshotRing::with_capacity(CPU_SNAPSHOT_WINDOW),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_snapshot_capacity(mut self, capacity: usize) -> Self {
        self.ring = SnapshotRing::with_capacity(capacity);
        self
    }

    fn read_usage_counter(&self) -> Result<u64, Error> {
        let path = self.dir.join("cpu.stat");
        let contents = read_file(&path)?;
        stat_value(&contents, "usage_usec").ok_or_else(|| missing_stat_key(&path, "usage_usec"))
    }

    fn read_mem_limit(&self) -> Result<u64, Error> {
        let path = self.dir.join("memory.max");
        let contents = read_file(&path)?;
        let value = contents.trim();
        if value == "max" {
            // Unlimited group: the fraction degrades toward zero.
            return Ok(u64::MAX);
        }
        if value.is_empty() {
            return Err(Error::EmptyCgroupFile { path });
        }
        value.parse().map_err(|e| Error::MalformedCgroupFile {
            path,
            reason: format!("{value:?}: {e}"),
        })
    }
}

impl CgroupReader for CgroupV2 {
    fn load_cpu_quota(&mut self) -> Result<(), Error> {
        let path = self.dir.join("cpu.max");
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::CpuQuotaUndefined);
            }
            Err(source) => return Err(Error::Io { path, source }),
        };

        let line = contents.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return Err(Error::EmptyCgroupFile { path });
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() > 2 {
            return Err(Error::MalformedCgroupFile {
                path,
                reason: format!("expected 1 or 2 fields, found {}", fields.len()),
            });
        }
        if fields[0] == "max" {
            return Err(Error::CpuQuotaUndefined);
        }

        let max: u64 = fields[0].parse().map_err(|e| Error::MalformedCgroupFile {
            path: path.clone(),
            reason: format!("quota {:?}: {e}", fields[0]),
        })?;
        let period: u64 = match fields.get(1) {
            Some(raw) => raw.parse().map_err(|e| Error::MalformedCgroupFile {
                path: path.clone(),
                reason: format!("period {raw:?}: {e}"),
            })?,
            None => CPU_MAX_DEFAULT_PERIOD,
        };
        if period == 0 {
            return Err(Error::MalformedCgroupFile {
                path,
                reason: "zero period".to_string(),
            });
        }

        self.cpu_quota = max as f64 / period as f64;
        Ok(())
    }

    fn cpu_usage(&mut self) -> Result<f64, Error> {
        let usage = self.read_usage_counter()?;
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
        let current: u64 = read_scalar(&self.dir.join("memory.current"))?;
        let stat_path = self.dir.join("memory.stat");
        let stat = read_file(&stat_path)?;
        let inactive_file = stat_value(&stat, "inactive_file")
            .ok_or_else(|| missing_stat_key(&stat_path, "inactive_file"))?;
        let limit = self.read_mem_limit()?;

        let working_set = current.saturating_sub(inactive_file);
        Ok(working_set as f64 / limit as f64)
    }
}

/// Pick the unified hierarchy entry (`0::<group>`) out of `/proc/self/cgroup`.
/// Hybrid hosts list the legacy controllers on other lines.
fn parse_unified_group(contents: &str) -> Option<&str> {
    contents.lines().find_map(|line| line.strip_prefix("0::"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn reader(dir: &TempDir) -> CgroupV2 {
        CgroupV2::with_group_path(dir.path(), "")
    }

    #[test]
    fn test_load_cpu_quota_with_period() {
        let dir = fixture(&[("cpu.max", "200000 100000\n")]);
        let mut c = reader(&dir);
        c.load_cpu_quota().unwrap();
        assert!((c.cpu_quota - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_cpu_quota_default_period() {
        let dir = fixture(&[("cpu.max", "150000\n")]);
        let mut c = reader(&dir);
        c.load_cpu_quota().unwrap();
        assert!((c.cpu_quota - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_cpu_quota_unlimited() {
        let dir = fixture(&[("cpu.max", "max 100000\n")]);
        let mut c = reader(&dir);
        assert!(matches!(
            c.load_cpu_quota(),
            Err(Error::CpuQuotaUndefined)
        ));
    }

    #[test]
    fn test_load_cpu_quota_missing_file() {
        let dir = fixture(&[]);
        let mut c = reader(&dir);
        assert!(matches!(
            c.load_cpu_quota(),
            Err(Error::CpuQuotaUndefined)
        ));
    }

    #[test]
    fn test_load_cpu_quota_empty_file() {
        let dir = fixture(&[("cpu.max", "\n")]);
        let mut c = reader(&dir);
        assert!(matches!(
            c.load_cpu_quota(),
            Err(Error::EmptyCgroupFile { .. })
        ));
    }

    #[test]
    fn test_load_cpu_quota_too_many_fields() {
        let dir = fixture(&[("cpu.max", "100000 100000 100000\n")]);
        let mut c = reader(&dir);
        assert!(matches!(
            c.load_cpu_quota(),
            Err(Error::MalformedCgroupFile { .. })
        ));
    }

    #[test]
    fn test_load_cpu_quota_garbage() {
        let dir = fixture(&[("cpu.max", "lots of\n")]);
        let mut c = reader(&dir);
        assert!(matches!(
            c.load_cpu_quota(),
            Err(Error::MalformedCgroupFile { .. })
        ));
    }

    #[test]
    fn test_mem_usage_working_set_over_limit() {
        let dir = fixture(&[
            ("memory.current", "1000000\n"),
            ("memory.stat", "anon 700000\ninactive_file 200000\n"),
            ("memory.max", "2000000\n"),
        ]);
        let mut c = reader(&dir);
        // (1000000 - 200000) / 2000000
        assert!((c.mem_usage().unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_mem_usage_unlimited_group_is_near_zero() {
        let dir = fixture(&[
            ("memory.current", "1000000\n"),
            ("memory.stat", "inactive_file 0\n"),
            ("memory.max", "max\n"),
        ]);
        let mut c = reader(&dir);
        assert!(c.mem_usage().unwrap() < 1e-9);
    }

    #[test]
    fn test_mem_usage_missing_stat_key() {
        let dir = fixture(&[
            ("memory.current", "1000000\n"),
            ("memory.stat", "anon 700000\n"),
            ("memory.max", "2000000\n"),
        ]);
        let mut c = reader(&dir);
        assert!(matches!(
            c.mem_usage(),
            Err(Error::MalformedCgroupFile { .. })
        ));
    }

    #[test]
    fn test_cpu_usage_zero_until_ring_fills() {
        let dir = fixture(&[
            ("cpu.max", "100000 100000\n"),
            ("cpu.stat", "usage_usec 1000000\n"),
        ]);
        let mut c = reader(&dir).with_snapshot_capacity(3);
        c.load_cpu_quota().unwrap();

        assert_eq!(c.cpu_usage().unwrap(), 0.0);
        fs::write(dir.path().join("cpu.stat"), "usage_usec 2000000\n").unwrap();
        assert_eq!(c.cpu_usage().unwrap(), 0.0);
        fs::write(dir.path().join("cpu.stat"), "usage_usec 3000000\n").unwrap();
        // Third read fills the ring; the counter grew, so usage is positive.
        assert!(c.cpu_usage().unwrap() > 0.0);
    }

    #[test]
    fn test_cpu_usage_missing_stat_file() {
        let dir = fixture(&[("cpu.max", "100000 100000\n")]);
        let mut c = reader(&dir);
        assert!(matches!(c.cpu_usage(), Err(Error::Io { .. })));
    }

    #[test]
    fn test_parse_unified_group() {
        assert_eq!(parse_unified_group("0::/kube/pod1\n"), Some("/kube/pod1"));
        assert_eq!(
            parse_unified_group("3:cpu:/legacy\n0::/unified\n"),
            Some("/unified")
        );
        assert_eq!(parse_unified_group("3:cpu:/legacy\n"), None);
    }
}

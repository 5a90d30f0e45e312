// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cgroup;
use crate::error::Error;

pub const DEFAULT_CPU_THRESHOLD: f64 = 0.75;
pub const DEFAULT_MEM_THRESHOLD: f64 = 0.75;
pub const DEFAULT_TASK_THRESHOLD: usize = 50_000;
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 5;
/// One minute of suppressed reports at the default watch interval.
pub const DEFAULT_MIN_CONSECUTIVE_OVER_THRESHOLD: u32 = 12;

/// Watchdog configuration. Constructed in code or loaded from a YAML file;
/// zero-valued numeric fields fall back to their defaults at start, so a
/// partially specified config behaves the same either way.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Skip CPU watching even when a quota is set.
    pub disable_cpu_watch: bool,
    /// Skip memory watching.
    pub disable_mem_watch: bool,
    /// Skip task count watching.
    pub disable_task_watch: bool,

    /// Fraction of the CPU quota (0 to 1) above which a CPU profile is
    /// captured and reported.
    pub cpu_threshold: f64,
    /// Fraction of the memory limit (0 to 1) above which a heap profile is
    /// captured and reported.
    pub mem_threshold: f64,
    /// Live task count above which a task dump is captured and reported.
    pub task_threshold: usize,

    /// Seconds between usage samples.
    pub watch_interval_secs: u64,
    /// Number of consecutive over-threshold samples after which the watcher
    /// re-arms and reports again during sustained overload.
    pub min_consecutive_over_threshold: u32,

    /// On any first breach, also capture and report the other enabled
    /// resource's profile using its current instantaneous reading.
    pub report_all_on_breach: bool,

    /// Cgroup filesystem mount point. Only changed in tests and on hosts
    /// with a non-standard mount.
    pub cgroup_mount_point: PathBuf,
    /// Group directory override for the unified layout. When unset, the
    /// process's own group is resolved from /proc/self/cgroup.
    pub cgroup_group_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disable_cpu_watch: false,
            disable_mem_watch: false,
            disable_task_watch: false,
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
            mem_threshold: DEFAULT_MEM_THRESHOLD,
            task_threshold: DEFAULT_TASK_THRESHOLD,
            watch_interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
            min_consecutive_over_threshold: DEFAULT_MIN_CONSECUTIVE_OVER_THRESHOLD,
            report_all_on_breach: false,
            cgroup_mount_point: PathBuf::from(cgroup::DEFAULT_MOUNT_POINT),
            cgroup_group_path: None,
        }
    }
}

impl Config {
    /// Parse a YAML config file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| Error::InvalidConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.disable_cpu_watch && self.disable_mem_watch && self.disable_task_watch {
            return Err(Error::AllWatchesDisabled);
        }
        if !(0.0..=1.0).contains(&self.cpu_threshold) {
            return Err(Error::InvalidCpuThreshold);
        }
        if !(0.0..=1.0).contains(&self.mem_threshold) {
            return Err(Error::InvalidMemThreshold);
        }
        Ok(())
    }

    /// Replace zero-valued numerics with their defaults. A zero threshold or
    /// interval always means "unset", never "fire on every sample".
    pub(crate) fn normalized(mut self) -> Self {
        if self.cpu_threshold == 0.0 {
            self.cpu_threshold = DEFAULT_CPU_THRESHOLD;
        }
        if self.mem_threshold == 0.0 {
            self.mem_threshold = DEFAULT_MEM_THRESHOLD;
        }
        if self.task_threshold == 0 {
            self.task_threshold = DEFAULT_TASK_THRESHOLD;
        }
        if self.watch_interval_secs == 0 {
            self.watch_interval_secs = DEFAULT_WATCH_INTERVAL_SECS;
        }
        if self.min_consecutive_over_threshold == 0 {
            self.min_consecutive_over_threshold = DEFAULT_MIN_CONSECUTIVE_OVER_THRESHOLD;
        }
        self
    }

    pub(crate) fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.cpu_threshold, DEFAULT_CPU_THRESHOLD);
        assert_eq!(cfg.mem_threshold, DEFAULT_MEM_THRESHOLD);
        assert_eq!(cfg.task_threshold, DEFAULT_TASK_THRESHOLD);
        assert_eq!(cfg.watch_interval_secs, DEFAULT_WATCH_INTERVAL_SECS);
        assert_eq!(
            cfg.min_consecutive_over_threshold,
            DEFAULT_MIN_CONSECUTIVE_OVER_THRESHOLD
        );
        assert!(!cfg.disable_cpu_watch);
        assert!(!cfg.report_all_on_breach);
        assert_eq!(
            cfg.cgroup_mount_point,
            PathBuf::from(cgroup::DEFAULT_MOUNT_POINT)
        );
        cfg.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_all_disabled() {
        let cfg = Config {
            disable_cpu_watch: true,
            disable_mem_watch: true,
            disable_task_watch: true,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::AllWatchesDisabled)));
    }

    #[test]
    fn test_validate_rejects_cpu_threshold_out_of_range() {
        let cfg = Config {
            cpu_threshold: 1.5,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidCpuThreshold)));

        let cfg = Config {
            cpu_threshold: -0.1,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidCpuThreshold)));
    }

    #[test]
    fn test_validate_rejects_mem_threshold_out_of_range() {
        let cfg = Config {
            mem_threshold: 2.0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidMemThreshold)));
    }

    #[test]
    fn test_validate_accepts_one_watch_disabled() {
        let cfg = Config {
            disable_cpu_watch: true,
            disable_task_watch: true,
            ..Config::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_normalized_fills_zeroed_fields() {
        let cfg = Config {
            cpu_threshold: 0.0,
            mem_threshold: 0.0,
            task_threshold: 0,
            watch_interval_secs: 0,
            min_consecutive_over_threshold: 0,
            ..Config::default()
        }
        .normalized();
        assert_eq!(cfg.cpu_threshold, DEFAULT_CPU_THRESHOLD);
        assert_eq!(cfg.mem_threshold, DEFAULT_MEM_THRESHOLD);
        assert_eq!(cfg.task_threshold, DEFAULT_TASK_THRESHOLD);
        assert_eq!(cfg.watch_interval_secs, DEFAULT_WATCH_INTERVAL_SECS);
        assert_eq!(
            cfg.min_consecutive_over_threshold,
            DEFAULT_MIN_CONSECUTIVE_OVER_THRESHOLD
        );
    }

    #[test]
    fn test_normalized_keeps_explicit_values() {
        let cfg = Config {
            cpu_threshold: 0.5,
            watch_interval_secs: 1,
            min_consecutive_over_threshold: 3,
            ..Config::default()
        }
        .normalized();
        assert_eq!(cfg.cpu_threshold, 0.5);
        assert_eq!(cfg.watch_interval_secs, 1);
        assert_eq!(cfg.min_consecutive_over_threshold, 3);
    }

    #[test]
    fn test_from_yaml_file_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoprofile.yaml");
        fs::write(
            &path,
            r#"
disable_task_watch: true
cpu_threshold: 0.6
mem_threshold: 0.8
watch_interval_secs: 10
min_consecutive_over_threshold: 6
report_all_on_breach: true
"#,
        )
        .unwrap();

        let cfg = Config::from_yaml_file(&path).unwrap();
        assert!(cfg.disable_task_watch);
        assert!(!cfg.disable_cpu_watch);
        assert_eq!(cfg.cpu_threshold, 0.6);
        assert_eq!(cfg.mem_threshold, 0.8);
        assert_eq!(cfg.watch_interval_secs, 10);
        assert_eq!(cfg.min_consecutive_over_threshold, 6);
        assert!(cfg.report_all_on_breach);
    }

    #[test]
    fn test_from_yaml_file_minimal_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoprofile.yaml");
        fs::write(&path, "cpu_threshold: 0.9\n").unwrap();

        let cfg = Config::from_yaml_file(&path).unwrap();
        assert_eq!(cfg.cpu_threshold, 0.9);
        assert_eq!(cfg.mem_threshold, DEFAULT_MEM_THRESHOLD);
        assert_eq!(cfg.watch_interval_secs, DEFAULT_WATCH_INTERVAL_SECS);
    }

    #[test]
    fn test_from_yaml_file_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "cpu_threshold: [not a number\n").unwrap();
        assert!(matches!(
            Config::from_yaml_file(&path),
            Err(Error::InvalidConfigFile { .. })
        ));
    }

    #[test]
    fn test_from_yaml_file_missing_file() {
        let result = Config::from_yaml_file(Path::new("/nonexistent/autoprofile.yaml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}

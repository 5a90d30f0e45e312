// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error type used at the `Profiler`/`Reporter` collaborator seams,
/// where the concrete error type belongs to the embedding application.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the watchdog. Everything here is returned from
/// `Watchdog::start`; once the watch loops are running, failures are only
/// logged (and a failing cgroup read permanently stops the affected loop).
#[derive(Debug, Error)]
pub enum Error {
    #[error("autoprofile is only supported on Linux hosts")]
    UnsupportedPlatform,

    #[error("cgroup accounting is unavailable on this host")]
    CgroupsUnavailable,

    #[error("cpu threshold must be between 0 and 1")]
    InvalidCpuThreshold,

    #[error("memory threshold must be between 0 and 1")]
    InvalidMemThreshold,

    #[error("all resource watches are disabled")]
    AllWatchesDisabled,

    /// The CPU controller reports no quota (the quota file is missing, or
    /// the group runs unlimited). Distinct from a malformed or empty file.
    #[error("cpu quota is not set for this cgroup")]
    CpuQuotaUndefined,

    #[error("cgroup file {path} is empty")]
    EmptyCgroupFile { path: PathBuf },

    #[error("malformed cgroup file {path}: {reason}")]
    MalformedCgroupFile { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    InvalidConfigFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

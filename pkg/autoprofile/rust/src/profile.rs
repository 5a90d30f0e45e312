// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BoxError;

/// Conventional sampling window for a CPU profile capture. Implementations
/// are expected to block `profile_cpu` for roughly this long.
pub const DEFAULT_CPU_PROFILE_DURATION: Duration = Duration::from_secs(10);

/// Captures profile artifacts for the process under watch.
///
/// Rust ships no built-in profiler, so the embedding application wires one in
/// (pprof-style samplers and allocator-level heap profilers are the usual
/// choices). Each method returns a self-describing binary artifact that
/// standard profile-visualization tooling can consume directly.
///
/// `profile_cpu` is a deliberately blocking capture: the calling watch loop
/// suspends until the sampling window ends. `profile_heap` and
/// `profile_tasks` are instantaneous.
#[async_trait]
pub trait Profiler: Send + Sync {
    async fn profile_cpu(&self) -> Result<Vec<u8>, BoxError>;

    async fn profile_heap(&self) -> Result<Vec<u8>, BoxError>;

    async fn profile_tasks(&self) -> Result<Vec<u8>, BoxError>;
}

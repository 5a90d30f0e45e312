// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-process resource watchdog that captures and ships diagnostic profiles
//! the moment a container resource crosses a configured threshold.
//!
//! The watchdog samples three signals on a fixed interval:
//!
//! 1. **CPU**: fraction of the cgroup CPU quota consumed over a sliding
//!    window of usage snapshots (both the legacy and the unified cgroup
//!    layout are supported, selected by a one-time probe).
//! 2. **Memory**: working set (resident usage minus reclaimable file-backed
//!    pages) as a fraction of the cgroup memory limit.
//! 3. **Tasks**: live task count on the Tokio runtime.
//!
//! When a signal first crosses its threshold, the matching profile is
//! captured through the application-supplied [`Profiler`] and shipped
//! through the application-supplied [`Reporter`], annotated with the
//! observed and threshold values. Consecutive over-threshold samples are
//! suppressed until the configured re-arm count elapses, so a sustained
//! incident produces a steady trickle of reports instead of one per sample.
//!
//! ## Usage
//!
//! ```rust
//! let config = dd_autoprofile::Config {
//!     cpu_threshold: 0.8,
//!     ..dd_autoprofile::Config::default()
//! };
//! let mut watchdog = dd_autoprofile::Watchdog::start(config, profiler, reporter)?;
//! // ... service runs ...
//! watchdog.stop().await;
//! ```
//!
//! A process-wide wrapper ([`start`]/[`stop`]) is available for applications
//! that do not want to thread the handle through their shutdown path.

mod cgroup;
mod config;
mod error;
mod profile;
mod report;
mod runtime;
mod snapshot;
mod watcher;
mod watchdog;

pub use config::{
    Config, DEFAULT_CPU_THRESHOLD, DEFAULT_MEM_THRESHOLD,
    DEFAULT_MIN_CONSECUTIVE_OVER_THRESHOLD, DEFAULT_TASK_THRESHOLD, DEFAULT_WATCH_INTERVAL_SECS,
};
pub use error::{BoxError, Error};
pub use profile::{DEFAULT_CPU_PROFILE_DURATION, Profiler};
pub use report::{CpuUsageInfo, MemUsageInfo, Reporter, TaskUsageInfo};
pub use watchdog::Watchdog;

use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

static GLOBAL_WATCHDOG: Mutex<Option<Watchdog>> = Mutex::new(None);

/// Start the process-wide watchdog. Must be called from within a Tokio
/// runtime. A previously started global watchdog is replaced; its loops stop
/// once the old handle is dropped.
pub fn start(
    config: Config,
    profiler: Arc<dyn Profiler>,
    reporter: Arc<dyn Reporter>,
) -> Result<(), Error> {
    let watchdog = Watchdog::start(config, profiler, reporter)?;
    let previous = GLOBAL_WATCHDOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(watchdog);
    if previous.is_some() {
        warn!("replaced an already-running global watchdog");
    }
    Ok(())
}

/// Stop the process-wide watchdog and wait for its loops to wind down.
/// Returns immediately when no global watchdog is running.
pub async fn stop() {
    let watchdog = GLOBAL_WATCHDOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(mut watchdog) = watchdog {
        watchdog.stop().await;
    }
}

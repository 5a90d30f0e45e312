// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Per-resource watch loops and the hysteresis rule that keeps a pinned
//! resource from flooding the report destination.
//!
//! Each loop owns its own `ThresholdState` and ticks on a fixed interval.
//! Without the re-arm rule a resource stuck above threshold would fire on
//! every tick; with it, at most one report goes out per suppression window
//! while the condition persists.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::cgroup::CgroupReader;
use crate::error::{BoxError, Error};
use crate::profile::Profiler;
use crate::report::{CpuUsageInfo, MemUsageInfo, Reporter, TaskUsageInfo};
use crate::runtime::TaskCounter;

/// Deadline applied to every reporter call so a hung destination cannot
/// stall the watch loop.
const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// Below threshold; the consecutive-over counter was reset.
    Under,
    /// First over-threshold sample since the watcher was (re-)armed: fire.
    FirstOver,
    /// Still over threshold inside the suppression window: stay quiet.
    SuppressedOver,
}

/// Consecutive-over-threshold suppression. After `min_consecutive_over`
/// over-threshold samples the counter wraps to zero, re-arming the watcher
/// even though usage never dropped, which bounds the reporting silence
/// during sustained overload to `min_consecutive_over * watch_interval`.
#[derive(Debug)]
pub(crate) struct ThresholdState {
    min_consecutive_over: u32,
    consecutive_over: u32,
}

impl ThresholdState {
    pub(crate) fn new(min_consecutive_over: u32) -> Self {
        assert!(
            min_consecutive_over > 0,
            "min consecutive over threshold must be positive"
        );
        Self {
            min_consecutive_over,
            consecutive_over: 0,
        }
    }

    pub(crate) fn observe(&mut self, over_threshold: bool) -> Tick {
        if !over_threshold {
            self.consecutive_over = 0;
            return Tick::Under;
        }
        let tick = if self.consecutive_over == 0 {
            Tick::FirstOver
        } else {
            Tick::SuppressedOver
        };
        self.consecutive_over += 1;
        if self.consecutive_over >= self.min_consecutive_over {
            self.consecutive_over = 0;
        }
        tick
    }
}

/// Collaborators shared by the watch loops. The cgroup reader mutates its
/// snapshot ring on every CPU read, so cross-loop access goes through the
/// mutex.
pub(crate) struct Shared {
    pub(crate) reader: Mutex<Box<dyn CgroupReader>>,
    pub(crate) profiler: Arc<dyn Profiler>,
    pub(crate) reporter: Arc<dyn Reporter>,
}

impl Shared {
    fn read_cpu_usage(&self) -> Result<f64, Error> {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cpu_usage()
    }

    fn read_mem_usage(&self) -> Result<f64, Error> {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mem_usage()
    }

    async fn report_cpu(&self, info: CpuUsageInfo) -> Result<(), BoxError> {
        let profile = self.profiler.profile_cpu().await?;
        with_deadline(self.reporter.report_cpu_profile(&profile, info)).await
    }

    async fn report_heap(&self, info: MemUsageInfo) -> Result<(), BoxError> {
        let profile = self.profiler.profile_heap().await?;
        with_deadline(self.reporter.report_heap_profile(&profile, info)).await
    }

    async fn report_tasks(&self, info: TaskUsageInfo) -> Result<(), BoxError> {
        let profile = self.profiler.profile_tasks().await?;
        with_deadline(self.reporter.report_task_profile(&profile, info)).await
    }
}

async fn with_deadline<F>(fut: F) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    match tokio::time::timeout(REPORT_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(Box::new(elapsed)),
    }
}

pub(crate) struct CpuWatch {
    pub(crate) shared: Arc<Shared>,
    pub(crate) interval: Duration,
    pub(crate) threshold: f64,
    pub(crate) state: ThresholdState,
    /// Memory threshold to annotate the cross-resource report with when
    /// report-all mode is active and memory watching is enabled.
    pub(crate) cross_mem_threshold: Option<f64>,
    pub(crate) stop: watch::Receiver<bool>,
}

impl CpuWatch {
    pub(crate) async fn run(mut self) {
        debug!("cpu watch running (threshold: {:.2})", self.threshold);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.stop.changed() => {
                    debug!("cpu watch stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let usage = match self.shared.read_cpu_usage() {
                Ok(usage) => usage,
                Err(e) => {
                    error!("cpu usage read failed, stopping the cpu watch: {e}");
                    return;
                }
            };
            if self.state.observe(usage >= self.threshold) != Tick::FirstOver {
                continue;
            }

            if let Err(e) = self
                .shared
                .report_cpu(CpuUsageInfo {
                    threshold: self.threshold,
                    usage,
                })
                .await
            {
                warn!("failed to report the cpu profile: {e}");
            }

            if let Some(mem_threshold) = self.cross_mem_threshold {
                let mem_usage = match self.shared.read_mem_usage() {
                    Ok(usage) => usage,
                    Err(e) => {
                        error!("memory usage read failed, stopping the cpu watch: {e}");
                        return;
                    }
                };
                if let Err(e) = self
                    .shared
                    .report_heap(MemUsageInfo {
                        threshold: mem_threshold,
                        usage: mem_usage,
                    })
                    .await
                {
                    warn!("failed to report the heap profile: {e}");
                }
            }
        }
    }
}

pub(crate) struct MemWatch {
    pub(crate) shared: Arc<Shared>,
    pub(crate) interval: Duration,
    pub(crate) threshold: f64,
    pub(crate) state: ThresholdState,
    /// CPU threshold to annotate the cross-resource report with when
    /// report-all mode is active and CPU watching is enabled.
    pub(crate) cross_cpu_threshold: Option<f64>,
    pub(crate) stop: watch::Receiver<bool>,
}

impl MemWatch {
    pub(crate) async fn run(mut self) {
        debug!("memory watch running (threshold: {:.2})", self.threshold);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.stop.changed() => {
                    debug!("memory watch stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let usage = match self.shared.read_mem_usage() {
                Ok(usage) => usage,
                Err(e) => {
                    error!("memory usage read failed, stopping the memory watch: {e}");
                    return;
                }
            };
            if self.state.observe(usage >= self.threshold) != Tick::FirstOver {
                continue;
            }

            if let Err(e) = self
                .shared
                .report_heap(MemUsageInfo {
                    threshold: self.threshold,
                    usage,
                })
                .await
            {
                warn!("failed to report the heap profile: {e}");
            }

            if let Some(cpu_threshold) = self.cross_cpu_threshold {
                let cpu_usage = match self.shared.read_cpu_usage() {
                    Ok(usage) => usage,
                    Err(e) => {
                        error!("cpu usage read failed, stopping the memory watch: {e}");
                        return;
                    }
                };
                if let Err(e) = self
                    .shared
                    .report_cpu(CpuUsageInfo {
                        threshold: cpu_threshold,
                        usage: cpu_usage,
                    })
                    .await
                {
                    warn!("failed to report the cpu profile: {e}");
                }
            }
        }
    }
}

pub(crate) struct TaskWatch {
    pub(crate) shared: Arc<Shared>,
    pub(crate) counter: TaskCounter,
    pub(crate) interval: Duration,
    pub(crate) threshold: usize,
    pub(crate) state: ThresholdState,
    pub(crate) stop: watch::Receiver<bool>,
}

impl TaskWatch {
    pub(crate) async fn run(mut self) {
        debug!("task watch running (threshold: {})", self.threshold);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.stop.changed() => {
                    debug!("task watch stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let count = self.counter.count();
            if self.state.observe(count >= self.threshold) != Tick::FirstOver {
                continue;
            }

            if let Err(e) = self
                .shared
                .report_tasks(TaskUsageInfo {
                    threshold: self.threshold,
                    count,
                })
                .await
            {
                warn!("failed to report the task profile: {e}");
            }
        }
    }
}

// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The orchestrator: validates configuration, probes the cgroup layout,
//! spawns one watch loop per enabled resource and ties them to a single
//! broadcast stop signal.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cgroup;
use crate::config::Config;
use crate::error::Error;
use crate::profile::Profiler;
use crate::report::Reporter;
use crate::runtime::TaskCounter;
use crate::watcher::{CpuWatch, MemWatch, Shared, TaskWatch, ThresholdState};

/// Handle to a running set of watch loops.
///
/// Obtained from [`Watchdog::start`]; dropping it without calling
/// [`Watchdog::stop`] also terminates the loops (the stop channel closes),
/// but without waiting for an in-flight capture to finish.
pub struct Watchdog {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Watchdog {
    /// Validate `config`, probe the cgroup layout and spawn the watch loops.
    ///
    /// Must be called from within a Tokio runtime. If CPU quota discovery
    /// fails while memory watching is enabled, CPU watching is disabled and
    /// startup continues; with memory watching disabled too, the discovery
    /// error is returned instead.
    pub fn start(
        config: Config,
        profiler: Arc<dyn Profiler>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, Error> {
        if cfg!(not(target_os = "linux")) {
            return Err(Error::UnsupportedPlatform);
        }
        config.validate()?;
        let config = config.normalized();

        let mut reader = cgroup::detect(
            &config.cgroup_mount_point,
            config.cgroup_group_path.as_deref(),
        )?;

        let mut cpu_enabled = !config.disable_cpu_watch;
        if cpu_enabled {
            if let Err(e) = reader.load_cpu_quota() {
                if config.disable_mem_watch {
                    return Err(e);
                }
                warn!("disabling the cpu watch, cpu quota is unavailable: {e}");
                cpu_enabled = false;
            }
        }
        let mem_enabled = !config.disable_mem_watch;
        let task_enabled = !config.disable_task_watch;

        let shared = Arc::new(Shared {
            reader: Mutex::new(reader),
            profiler,
            reporter,
        });
        let (stop_tx, stop_rx) = watch::channel(false);
        let interval = config.watch_interval();
        let min_over = config.min_consecutive_over_threshold;
        let report_all = config.report_all_on_breach;
        let mut tasks = Vec::new();

        if cpu_enabled {
            let watch = CpuWatch {
                shared: shared.clone(),
                interval,
                threshold: config.cpu_threshold,
                state: ThresholdState::new(min_over),
                cross_mem_threshold: (report_all && mem_enabled).then_some(config.mem_threshold),
                stop: stop_rx.clone(),
            };
            tasks.push(tokio::spawn(watch.run()));
        }
        if mem_enabled {
            let watch = MemWatch {
                shared: shared.clone(),
                interval,
                threshold: config.mem_threshold,
                state: ThresholdState::new(min_over),
                cross_cpu_threshold: (report_all && cpu_enabled).then_some(config.cpu_threshold),
                stop: stop_rx.clone(),
            };
            tasks.push(tokio::spawn(watch.run()));
        }
        if task_enabled {
            let watch = TaskWatch {
                shared: shared.clone(),
                counter: TaskCounter::current(),
                interval,
                threshold: config.task_threshold,
                state: ThresholdState::new(min_over),
                stop: stop_rx,
            };
            tasks.push(tokio::spawn(watch.run()));
        }

        info!(
            "autoprofile watchdog started (cpu: {cpu_enabled}, memory: {mem_enabled}, tasks: {task_enabled})"
        );
        Ok(Self {
            stop: stop_tx,
            tasks,
        })
    }

    /// Signal every watch loop to stop and wait for them to wind down.
    ///
    /// Idempotent: stopping an already-stopped watchdog returns immediately.
    /// An in-flight capture or report is not interrupted, so the wait is
    /// bounded by the longest capture duration.
    pub async fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let _ = self.stop.send(true);
        for task in self.tasks.drain(..) {
            if task.await.is_err() {
                warn!("a watch task panicked during shutdown");
            }
        }
        info!("autoprofile watchdog stopped");
    }
}

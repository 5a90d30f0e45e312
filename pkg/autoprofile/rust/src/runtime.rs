// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use tokio::runtime::Handle;

/// Instantaneous count of live tasks on the Tokio runtime.
///
/// A task explosion (unbounded spawning, leaked loops) degrades a service
/// as surely as CPU or memory pressure, so the count is watched like any
/// other resource. Reads have no side effects and no failure mode.
pub(crate) struct TaskCounter {
    handle: Handle,
}

impl TaskCounter {
    /// Capture the current runtime's handle. Panics outside a Tokio runtime,
    /// like `tokio::spawn` itself.
    pub(crate) fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.handle.metrics().num_alive_tasks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_count_sees_spawned_tasks() {
        let counter = TaskCounter::current();
        let baseline = counter.count();

        let tasks: Vec<_> = (0..8)
            .map(|_| tokio::spawn(tokio::time::sleep(Duration::from_secs(60))))
            .collect();
        // Spawned tasks are alive until completed or aborted.
        assert!(counter.count() >= baseline + 8);

        for task in &tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn test_count_has_no_side_effects() {
        let counter = TaskCounter::current();
        let first = counter.count();
        let second = counter.count();
        // Nothing spawned in between; repeated reads agree.
        assert_eq!(first, second);
    }
}

//! Deferred task scheduling for reconnection.
//!
//! The connection manager never sleeps inline: it hands the retry to a
//! `Scheduler`. Production code uses `TokioScheduler`; `ManualScheduler`
//! holds tasks until the owner runs them, which makes retry timing
//! deterministic.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> ScheduleHandle;
}

/// Cancels a scheduled task that has not run yet.
#[derive(Debug, Clone, Default)]
pub struct ScheduleHandle {
    token: CancellationToken,
}

impl ScheduleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs tasks on the ambient tokio runtime after the delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        let token = handle.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => task(),
            }
        });
        handle
    }
}

struct PendingTask {
    delay: Duration,
    handle: ScheduleHandle,
    task: ScheduledTask,
}

#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<PendingTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingTask>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delays of the tasks still waiting to run, in scheduling order.
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.lock()
            .iter()
            .filter(|pending| !pending.handle.is_cancelled())
            .map(|pending| pending.delay)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_delays().len()
    }

    /// Runs every task scheduled so far, skipping cancelled ones. Tasks
    /// scheduled while running stay pending. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *self.lock());
        let mut ran = 0;
        for pending in tasks {
            if pending.handle.is_cancelled() {
                continue;
            }
            (pending.task)();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        self.lock().push(PendingTask {
            delay,
            handle: handle.clone(),
            task,
        });
        handle
    }
}

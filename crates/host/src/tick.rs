use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

use worldspace_common::{Owner, Ticks};
use worldspace_dispatch::{MainThreadScheduler, MainThreadTask, RepeatingTask, Task};

use crate::queue::{Job, TickQueue};
use crate::task::SimTask;

/// Main-thread scheduler: one sequential queue, advanced by [`tick`](Self::tick)
/// on whichever thread plays the main thread.
pub struct TickScheduler {
    queue: TickQueue,
    next_id: AtomicI32,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            queue: TickQueue::new("main"),
            next_id: AtomicI32::new(1),
        }
    }

    /// Run one tick of main-thread work. Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let _span = tracing::info_span!("main_tick").entered();
        self.queue.advance()
    }

    pub fn current_tick(&self) -> u64 {
        self.queue.current_tick()
    }

    /// Tasks waiting for a future tick, repeating tasks included.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn issue(&self, owner: &Owner, sync: bool) -> Arc<SimTask> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(SimTask::new(id, owner.clone(), sync, true))
    }

    fn schedule_once(&self, owner: &Owner, task: Task, delay: Ticks) -> Arc<dyn MainThreadTask> {
        let handle = self.issue(owner, true);
        self.queue
            .schedule(handle.clone(), delay, Job::Once(Box::new(move |_: &Arc<SimTask>| task())));
        handle
    }
}

impl MainThreadScheduler for TickScheduler {
    fn run_now(&self, owner: &Owner, task: Task) -> Arc<dyn MainThreadTask> {
        self.schedule_once(owner, task, Ticks::ZERO)
    }

    fn run_async(&self, owner: &Owner, task: Task) -> Arc<dyn MainThreadTask> {
        let handle = self.issue(owner, false);
        let record = handle.clone();
        let spawned = thread::Builder::new()
            .name("worldspace-tick-async".into())
            .spawn(move || {
                if record.cancelled() {
                    return;
                }
                record.record_run();
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    tracing::error!(id = record.id(), "async task panicked");
                }
            });
        if let Err(err) = spawned {
            tracing::error!(%err, id = handle.id(), %owner, "could not start async task thread");
        }
        handle
    }

    fn run_timer(
        &self,
        owner: &Owner,
        mut task: RepeatingTask,
        delay: Ticks,
        period: Ticks,
    ) -> Arc<dyn MainThreadTask> {
        let handle = self.issue(owner, true);
        self.queue.schedule_repeating(
            handle.clone(),
            delay,
            period,
            Box::new(move |_: &Arc<SimTask>| task()),
        );
        handle
    }

    fn run_later(&self, owner: &Owner, task: Task, delay: Ticks) -> Arc<dyn MainThreadTask> {
        self.schedule_once(owner, task, delay)
    }
}

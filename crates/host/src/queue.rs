use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use worldspace_common::Ticks;

use crate::task::SimTask;

pub(crate) type OnceJob = Box<dyn FnOnce(&Arc<SimTask>) + Send + 'static>;
pub(crate) type RepeatingJob = Box<dyn FnMut(&Arc<SimTask>) + Send + 'static>;

pub(crate) enum Job {
    Once(OnceJob),
    Repeating { job: RepeatingJob, period: u64 },
}

struct Entry {
    due: u64,
    seq: u64,
    task: Arc<SimTask>,
    job: Job,
}

#[derive(Default)]
struct QueueState {
    tick: u64,
    seq: u64,
    entries: Vec<Entry>,
}

/// Tick-ordered work queue for one sequential execution context.
///
/// Work due on the same tick runs in submission order. Work submitted while a
/// tick is running lands on a later tick.
pub(crate) struct TickQueue {
    name: String,
    state: Mutex<QueueState>,
}

impl TickQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Zero delay means "next tick".
    pub fn schedule(&self, task: Arc<SimTask>, delay: Ticks, job: Job) {
        let mut state = self.state.lock();
        let due = state.tick.saturating_add(delay.get().max(1));
        Self::push(&mut state, due, task, job);
    }

    pub fn schedule_repeating(
        &self,
        task: Arc<SimTask>,
        delay: Ticks,
        period: Ticks,
        job: RepeatingJob,
    ) {
        let job = Job::Repeating {
            job,
            period: period.get().max(1),
        };
        self.schedule(task, delay, job);
    }

    fn push(state: &mut QueueState, due: u64, task: Arc<SimTask>, job: Job) {
        state.seq += 1;
        let seq = state.seq;
        state.entries.push(Entry {
            due,
            seq,
            task,
            job,
        });
    }

    pub fn current_tick(&self) -> u64 {
        self.state.lock().tick
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Advance one tick and run everything due on the calling thread.
    /// Returns how many task bodies ran.
    pub fn advance(&self) -> usize {
        let (tick, mut due) = {
            let mut state = self.state.lock();
            state.tick += 1;
            let tick = state.tick;
            let (due, rest): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|e| e.due <= tick);
            state.entries = rest;
            (tick, due)
        };
        due.sort_by_key(|e| (e.due, e.seq));

        let mut ran = 0;
        for entry in due {
            let Entry { task, job, .. } = entry;
            if task.cancelled() {
                continue;
            }
            ran += 1;
            task.record_run();
            match job {
                Job::Once(job) => self.guarded(tick, || job(&task)),
                Job::Repeating { mut job, period } => {
                    self.guarded(tick, || job(&task));
                    if !task.cancelled() {
                        let mut state = self.state.lock();
                        let job = Job::Repeating { job, period };
                        Self::push(&mut state, tick.saturating_add(period), task, job);
                    }
                }
            }
        }

        tracing::trace!(queue = %self.name, tick, ran, "queue advanced");
        ran
    }

    /// A panicking task is reported and does not take the queue down with it.
    fn guarded(&self, tick: u64, f: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            let message = payload
                .downcast_ref::<&'static str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            tracing::error!(queue = %self.name, tick, %message, "task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldspace_common::Owner;

    fn task() -> Arc<SimTask> {
        Arc::new(SimTask::new(1, Owner::new("queue-test"), true, true))
    }

    fn log_job(log: &Arc<Mutex<Vec<u32>>>, value: u32) -> Job {
        let log = log.clone();
        Job::Once(Box::new(move |_: &Arc<SimTask>| log.lock().push(value)))
    }

    #[test]
    fn same_tick_preserves_submission_order() {
        let queue = TickQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            queue.schedule(task(), Ticks::ZERO, log_job(&log, i));
        }

        assert_eq!(queue.advance(), 5);
        assert_eq!(*log.lock(), [0, 1, 2, 3, 4]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn delayed_work_waits_for_its_tick() {
        let queue = TickQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.schedule(task(), Ticks(3), log_job(&log, 3));
        queue.schedule(task(), Ticks(1), log_job(&log, 1));

        assert_eq!(queue.advance(), 1);
        assert_eq!(queue.advance(), 0);
        assert_eq!(queue.advance(), 1);
        assert_eq!(*log.lock(), [1, 3]);
        assert_eq!(queue.current_tick(), 3);
    }

    #[test]
    fn cancelled_work_is_skipped() {
        let queue = TickQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = task();
        queue.schedule(t.clone(), Ticks::ZERO, log_job(&log, 1));
        t.mark_cancelled();

        assert_eq!(queue.advance(), 0);
        assert!(log.lock().is_empty());
        assert_eq!(t.runs(), 0);
    }

    #[test]
    fn repeating_work_rearms_until_cancelled() {
        let queue = TickQueue::new("test");
        let t = task();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        queue.schedule_repeating(
            t.clone(),
            Ticks(1),
            Ticks(2),
            Box::new(move |_: &Arc<SimTask>| *c.lock() += 1),
        );

        for _ in 0..5 {
            queue.advance();
        }
        // ticks 1, 3, 5
        assert_eq!(*count.lock(), 3);

        t.mark_cancelled();
        for _ in 0..4 {
            queue.advance();
        }
        assert_eq!(*count.lock(), 3);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn repeating_task_can_cancel_itself() {
        let queue = TickQueue::new("test");
        let t = task();
        queue.schedule_repeating(
            t.clone(),
            Ticks::ZERO,
            Ticks(1),
            Box::new(|task: &Arc<SimTask>| {
                if task.runs() >= 2 {
                    task.mark_cancelled();
                }
            }),
        );

        for _ in 0..5 {
            queue.advance();
        }
        assert_eq!(t.runs(), 2);
    }

    #[test]
    fn panicking_task_does_not_stop_the_tick() {
        let queue = TickQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.schedule(
            task(),
            Ticks::ZERO,
            Job::Once(Box::new(|_: &Arc<SimTask>| panic!("bad task"))),
        );
        queue.schedule(task(), Ticks::ZERO, log_job(&log, 2));

        assert_eq!(queue.advance(), 2);
        assert_eq!(*log.lock(), [2]);
    }

    #[test]
    fn huge_delay_saturates() {
        let queue = TickQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.advance();
        queue.schedule(task(), Ticks(u64::MAX), log_job(&log, 1));

        let t = task();
        queue.schedule_repeating(
            t.clone(),
            Ticks::ZERO,
            Ticks(u64::MAX),
            Box::new(|_: &Arc<SimTask>| {}),
        );
        for _ in 0..3 {
            queue.advance();
        }
        assert!(log.lock().is_empty());
        assert_eq!(t.runs(), 1);
        assert_eq!(queue.len(), 2);
    }
}

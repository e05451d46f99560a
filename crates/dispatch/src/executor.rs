//! Background workers standing in for the async scheduler regionized hosts lack.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use futures::channel::oneshot;
use parking_lot::{Condvar, Mutex};

use crate::error::{DispatchError, TaskError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How long a worker waits for new work before exiting.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

static PROCESS_POOL: OnceLock<FallbackExecutor> = OnceLock::new();

/// Cached pool of named worker threads.
///
/// Workers are spawned lazily whenever queued jobs outnumber idle workers and
/// are reused afterwards. A worker left idle for the keep-alive period exits.
#[derive(Clone)]
pub struct FallbackExecutor {
    shared: Arc<Shared>,
}

struct Shared {
    thread_name: String,
    keep_alive: Duration,
    state: Mutex<State>,
    available: Condvar,
}

#[derive(Default)]
struct State {
    jobs: VecDeque<Job>,
    idle: usize,
    workers: usize,
}

impl FallbackExecutor {
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self::with_keep_alive(thread_name, KEEP_ALIVE)
    }

    pub fn with_keep_alive(thread_name: impl Into<String>, keep_alive: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                thread_name: thread_name.into(),
                keep_alive,
                state: Mutex::new(State::default()),
                available: Condvar::new(),
            }),
        }
    }

    /// The process-wide pool shared by every regionized dispatcher.
    ///
    /// `thread_name` only takes effect on the first call; later callers get
    /// the pool as it was first created.
    pub fn shared(thread_name: &str) -> &'static FallbackExecutor {
        PROCESS_POOL.get_or_init(|| {
            tracing::debug!(thread_name, "creating process fallback pool");
            Self::new(thread_name)
        })
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Queue `job` without waiting for it.
    pub fn execute<F>(&self, job: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.jobs.push_back(Box::new(job));

        if state.jobs.len() > state.idle {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(self.shared.thread_name.clone())
                .spawn(move || worker_loop(&shared));
            match spawned {
                Ok(_) => {
                    state.workers += 1;
                    tracing::debug!(workers = state.workers, "started fallback worker");
                }
                Err(err) if state.idle == 0 && state.workers == 0 => {
                    // Nobody could ever pick the job up.
                    state.jobs.pop_back();
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(%err, "could not grow fallback pool, job stays queued");
                }
            }
        }

        self.shared.available.notify_one();
        Ok(())
    }

    /// Run `task` on a worker and suspend the caller until it finishes.
    ///
    /// A panic inside `task` is caught and returned as
    /// [`DispatchError::AsyncTask`] carrying [`TaskError::Panicked`].
    pub fn run_blocking<F>(&self, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.execute(move || {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(task)).map_err(TaskError::from_panic);
            let _ = tx.send(outcome);
        })
        .map_err(DispatchError::Executor)?;

        futures::executor::block_on(rx)
            .unwrap_or(Err(TaskError::Abandoned))
            .map_err(DispatchError::AsyncTask)
    }
}

fn worker_loop(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        let Some(job) = state.jobs.pop_front() else {
            state.idle += 1;
            let waited = shared.available.wait_for(&mut state, shared.keep_alive);
            state.idle -= 1;
            if waited.timed_out() && state.jobs.is_empty() {
                state.workers -= 1;
                tracing::debug!(workers = state.workers, "idle fallback worker exiting");
                return;
            }
            continue;
        };

        drop(state);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let err = TaskError::from_panic(payload);
            tracing::error!(%err, "fallback job panicked");
        }
        state = shared.state.lock();
    }
}

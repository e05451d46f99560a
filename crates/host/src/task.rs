use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use worldspace_common::Owner;
use worldspace_dispatch::{HandleError, MainThreadTask, ScheduledTask};

/// Native task record handed out by both reference schedulers.
#[derive(Debug)]
pub struct SimTask {
    id: i32,
    owner: Owner,
    sync: bool,
    report_owner: bool,
    cancelled: AtomicBool,
    runs: AtomicU64,
}

impl SimTask {
    pub(crate) fn new(id: i32, owner: Owner, sync: bool, report_owner: bool) -> Self {
        Self {
            id,
            owner,
            sync,
            report_owner,
            cancelled: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// How many times the task body has run.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub(crate) fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

impl MainThreadTask for SimTask {
    fn id(&self) -> i32 {
        self.id
    }

    fn owner(&self) -> Owner {
        self.owner.clone()
    }

    fn is_sync(&self) -> bool {
        self.sync
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled()
    }

    fn cancel(&self) {
        self.mark_cancelled();
    }
}

impl ScheduledTask for SimTask {
    fn owning_owner(&self) -> Result<Owner, HandleError> {
        if self.report_owner {
            Ok(self.owner.clone())
        } else {
            Err(HandleError::Unsupported("owning_owner"))
        }
    }

    fn is_cancelled(&self) -> Result<bool, HandleError> {
        Ok(self.cancelled())
    }

    fn cancel(&self) -> Result<(), HandleError> {
        self.mark_cancelled();
        Ok(())
    }
}

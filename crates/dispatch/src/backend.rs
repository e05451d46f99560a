//! Contracts the host environment implements.
//!
//! Main-thread hosts supply a [`MainThreadScheduler`]. Regionized hosts supply
//! a [`RegionizedServer`] giving access to the global and per-region
//! schedulers, while each [`SchedulableEntity`] hands out its own scheduler.

use std::sync::Arc;

use worldspace_common::{EntityId, Location, Owner, Ticks};

use crate::error::{BindError, HandleError};
use crate::model::CapabilityProbe;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Region callbacks receive the handle of the task being run.
pub type RegionCallback = Box<dyn FnOnce(&dyn ScheduledTask) + Send + 'static>;
pub type RepeatingCallback = Box<dyn FnMut(&dyn ScheduledTask) + Send + 'static>;

/// Handle issued by the main-thread scheduler.
pub trait MainThreadTask: Send + Sync {
    fn id(&self) -> i32;
    fn owner(&self) -> Owner;
    fn is_sync(&self) -> bool;
    fn is_cancelled(&self) -> bool;
    /// Must be safe to call repeatedly and after the task has finished.
    fn cancel(&self);
}

/// The single global sequential scheduler of a main-thread host.
///
/// Calls return immediately; the work runs later on the scheduler's thread
/// (or a background thread for `run_async`).
pub trait MainThreadScheduler: Send + Sync {
    fn run_now(&self, owner: &Owner, task: Task) -> Arc<dyn MainThreadTask>;
    fn run_async(&self, owner: &Owner, task: Task) -> Arc<dyn MainThreadTask>;
    fn run_timer(
        &self,
        owner: &Owner,
        task: RepeatingTask,
        delay: Ticks,
        period: Ticks,
    ) -> Arc<dyn MainThreadTask>;
    fn run_later(&self, owner: &Owner, task: Task, delay: Ticks) -> Arc<dyn MainThreadTask>;
}

/// Handle issued by a regionized scheduler. Every query may fail.
pub trait ScheduledTask: Send + Sync {
    /// Not every host tracks owners; the default reports the query as unsupported.
    fn owning_owner(&self) -> Result<Owner, HandleError> {
        Err(HandleError::Unsupported("owning_owner"))
    }

    fn is_cancelled(&self) -> Result<bool, HandleError>;

    fn cancel(&self) -> Result<(), HandleError>;
}

/// Scheduler for work that belongs to no particular region.
pub trait GlobalRegionScheduler: Send + Sync {
    fn run(
        &self,
        owner: &Owner,
        callback: RegionCallback,
    ) -> Result<Arc<dyn ScheduledTask>, BindError>;

    fn run_delayed(
        &self,
        owner: &Owner,
        callback: RegionCallback,
        delay: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError>;

    fn run_at_fixed_rate(
        &self,
        owner: &Owner,
        callback: RepeatingCallback,
        delay: Ticks,
        period: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError>;
}

/// Scheduler for the region owning a location.
pub trait RegionScheduler: Send + Sync {
    fn run(
        &self,
        owner: &Owner,
        location: &Location,
        callback: RegionCallback,
    ) -> Result<Arc<dyn ScheduledTask>, BindError>;

    fn run_delayed(
        &self,
        owner: &Owner,
        location: &Location,
        callback: RegionCallback,
        delay: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError>;

    fn run_at_fixed_rate(
        &self,
        owner: &Owner,
        location: &Location,
        callback: RepeatingCallback,
        delay: Ticks,
        period: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError>;
}

/// Scheduler that follows one entity across regions.
pub trait EntityScheduler: Send + Sync {
    /// Schedule `callback` on whichever region owns the entity when it runs.
    ///
    /// `retired` runs instead of `callback` if the entity is removed before the
    /// callback is due. `Ok(None)` means the entity is already gone and nothing
    /// was scheduled.
    fn run(
        &self,
        owner: &Owner,
        callback: RegionCallback,
        retired: Option<Task>,
    ) -> Result<Option<Arc<dyn ScheduledTask>>, BindError>;
}

/// An entity that can hand out its own scheduler.
pub trait SchedulableEntity: Send + Sync {
    fn entity_id(&self) -> EntityId;

    fn scheduler(&self) -> Result<Arc<dyn EntityScheduler>, BindError>;
}

/// Entry point to a regionized host's schedulers.
pub trait RegionizedServer: Send + Sync {
    fn global_region_scheduler(&self) -> Result<Arc<dyn GlobalRegionScheduler>, BindError>;

    fn region_scheduler(&self) -> Result<Arc<dyn RegionScheduler>, BindError>;
}

/// Everything the dispatcher needs from the host.
pub trait HostEnvironment: CapabilityProbe {
    fn main_thread_scheduler(&self) -> Option<Arc<dyn MainThreadScheduler>>;

    fn regionized_server(&self) -> Option<Arc<dyn RegionizedServer>>;
}

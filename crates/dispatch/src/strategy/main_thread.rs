use std::sync::Arc;

use worldspace_common::{Location, Owner, Ticks};

use super::SchedulingStrategy;
use crate::backend::{MainThreadScheduler, RepeatingTask, SchedulableEntity, Task};
use crate::error::DispatchError;
use crate::handle::TaskHandle;
use crate::model::ThreadingModel;

/// Forwards everything to the host's single main-thread scheduler.
///
/// The main thread has no notion of regions, so location- and entity-scoped
/// work simply runs there like any other task.
pub struct MainThreadStrategy {
    scheduler: Arc<dyn MainThreadScheduler>,
}

impl MainThreadStrategy {
    pub fn new(scheduler: Arc<dyn MainThreadScheduler>) -> Self {
        Self { scheduler }
    }
}

impl SchedulingStrategy for MainThreadStrategy {
    fn model(&self) -> ThreadingModel {
        ThreadingModel::MainThread
    }

    fn run_now(&self, owner: &Owner, task: Task) -> Result<TaskHandle, DispatchError> {
        Ok(TaskHandle::native(self.scheduler.run_now(owner, task)))
    }

    fn run_async_or_wait(&self, owner: &Owner, task: Task) -> Result<TaskHandle, DispatchError> {
        Ok(TaskHandle::native(self.scheduler.run_async(owner, task)))
    }

    fn run_repeating(
        &self,
        owner: &Owner,
        task: RepeatingTask,
        delay: Ticks,
        period: Ticks,
    ) -> Result<TaskHandle, DispatchError> {
        Ok(TaskHandle::native(self.scheduler.run_timer(owner, task, delay, period)))
    }

    fn run_delayed(
        &self,
        owner: &Owner,
        task: Task,
        delay: Ticks,
    ) -> Result<TaskHandle, DispatchError> {
        Ok(TaskHandle::native(self.scheduler.run_later(owner, task, delay)))
    }

    fn run_at_location(
        &self,
        owner: &Owner,
        location: &Location,
        task: Task,
    ) -> Result<TaskHandle, DispatchError> {
        tracing::trace!(%location, "no regions on main-thread host, running now");
        self.run_now(owner, task)
    }

    fn run_on_entity(
        &self,
        owner: &Owner,
        entity: &dyn SchedulableEntity,
        task: Task,
        _retired: Option<Task>,
    ) -> Result<TaskHandle, DispatchError> {
        let entity = entity.entity_id();
        tracing::trace!(%entity, "no entity schedulers on main-thread host, running now");
        self.run_now(owner, task)
    }
}

use std::sync::Arc;

use parking_lot::Mutex;
use worldspace_common::{EntityId, Location, Owner, Ticks};

use super::SchedulingStrategy;
use crate::adapter::AdaptedHandle;
use crate::backend::{
    GlobalRegionScheduler, RegionCallback, RegionScheduler, RegionizedServer, RepeatingCallback,
    RepeatingTask, SchedulableEntity, ScheduledTask, Task,
};
use crate::config::{DispatchConfig, RetiredEntityPolicy};
use crate::error::{DispatchError, Operation};
use crate::executor::FallbackExecutor;
use crate::handle::TaskHandle;
use crate::model::ThreadingModel;

/// A task that runs at most once, whichever path gets to it first.
type Pending = Arc<Mutex<Option<Task>>>;

/// Routes work to a regionized host's global, region and entity schedulers.
///
/// The global and region schedulers are resolved once at construction. The
/// host has no async scheduler, so async work runs on the process-wide
/// [`FallbackExecutor`] and the caller waits for it.
pub struct RegionizedStrategy {
    global: Arc<dyn GlobalRegionScheduler>,
    regions: Arc<dyn RegionScheduler>,
    executor: &'static FallbackExecutor,
    retired_policy: RetiredEntityPolicy,
}

impl RegionizedStrategy {
    pub fn new(
        server: Arc<dyn RegionizedServer>,
        config: &DispatchConfig,
    ) -> Result<Self, DispatchError> {
        let global = server
            .global_region_scheduler()
            .map_err(DispatchError::Resolve)?;
        let regions = server.region_scheduler().map_err(DispatchError::Resolve)?;
        Ok(Self {
            global,
            regions,
            executor: FallbackExecutor::shared(&config.async_thread_name),
            retired_policy: config.retired_entity,
        })
    }

    pub fn executor(&self) -> &'static FallbackExecutor {
        self.executor
    }

    fn run_global(
        &self,
        owner: &Owner,
        callback: RegionCallback,
        operation: Operation,
    ) -> Result<TaskHandle, DispatchError> {
        self.global
            .run(owner, callback)
            .map(adapt)
            .map_err(DispatchError::bind(operation))
    }

    /// What the host runs if the entity is removed before the task is due.
    fn on_retired(
        &self,
        owner: &Owner,
        entity: EntityId,
        pending: &Pending,
        fallback: &Pending,
    ) -> Task {
        let global = Arc::clone(&self.global);
        let policy = self.retired_policy;
        let owner = owner.clone();
        let pending = Arc::clone(pending);
        let fallback = Arc::clone(fallback);

        Box::new(move || {
            if take_and_run(&fallback) {
                return;
            }
            match policy {
                RetiredEntityPolicy::Drop => {
                    if pending.lock().take().is_some() {
                        tracing::warn!(%entity, %owner, "entity retired, task dropped");
                    }
                }
                RetiredEntityPolicy::Global => {
                    let callback: RegionCallback = Box::new(move |_: &dyn ScheduledTask| {
                        take_and_run(&pending);
                    });
                    let scheduled = global.run(&owner, callback);
                    if let Err(err) = scheduled {
                        tracing::error!(
                            %err,
                            %entity,
                            %owner,
                            "could not move retired entity task to the global region"
                        );
                    }
                }
            }
        })
    }
}

impl SchedulingStrategy for RegionizedStrategy {
    fn model(&self) -> ThreadingModel {
        ThreadingModel::Regionized
    }

    fn run_now(&self, owner: &Owner, task: Task) -> Result<TaskHandle, DispatchError> {
        self.run_global(owner, once(task), Operation::RunNow)
    }

    fn run_async_or_wait(&self, owner: &Owner, task: Task) -> Result<TaskHandle, DispatchError> {
        tracing::debug!(%owner, "no async scheduler, waiting on fallback executor");
        self.executor.run_blocking(task)?;
        Ok(TaskHandle::Placeholder)
    }

    fn run_repeating(
        &self,
        owner: &Owner,
        task: RepeatingTask,
        delay: Ticks,
        period: Ticks,
    ) -> Result<TaskHandle, DispatchError> {
        self.global
            .run_at_fixed_rate(owner, repeating(task), delay, period)
            .map(adapt)
            .map_err(DispatchError::bind(Operation::RunRepeating))
    }

    fn run_delayed(
        &self,
        owner: &Owner,
        task: Task,
        delay: Ticks,
    ) -> Result<TaskHandle, DispatchError> {
        self.global
            .run_delayed(owner, once(task), delay)
            .map(adapt)
            .map_err(DispatchError::bind(Operation::RunDelayed))
    }

    fn run_at_location(
        &self,
        owner: &Owner,
        location: &Location,
        task: Task,
    ) -> Result<TaskHandle, DispatchError> {
        self.regions
            .run(owner, location, once(task))
            .map(adapt)
            .map_err(DispatchError::bind(Operation::RunAtLocation))
    }

    fn run_on_entity(
        &self,
        owner: &Owner,
        entity: &dyn SchedulableEntity,
        task: Task,
        retired: Option<Task>,
    ) -> Result<TaskHandle, DispatchError> {
        let operation = Operation::RunOnEntity;
        let entity_id = entity.entity_id();
        let scheduler = entity
            .scheduler()
            .map_err(DispatchError::bind(operation))?;

        let pending: Pending = Arc::new(Mutex::new(Some(task)));
        let fallback: Pending = Arc::new(Mutex::new(retired));
        let on_retired = self.on_retired(owner, entity_id, &pending, &fallback);

        let run_pending = Arc::clone(&pending);
        let callback: RegionCallback = Box::new(move |_: &dyn ScheduledTask| {
            take_and_run(&run_pending);
        });

        let scheduled = scheduler
            .run(owner, callback, Some(on_retired))
            .map_err(DispatchError::bind(operation))?;
        if let Some(native) = scheduled {
            return Ok(adapt(native));
        }

        // The entity was already gone: nothing is scheduled yet.
        tracing::debug!(entity = %entity_id, %owner, "entity retired at submission");
        let reroute = if fallback.lock().is_some() {
            fallback
        } else if self.retired_policy == RetiredEntityPolicy::Global {
            pending
        } else {
            return Err(DispatchError::EntityRetired(entity_id));
        };
        self.run_global(
            owner,
            Box::new(move |_: &dyn ScheduledTask| {
                take_and_run(&reroute);
            }),
            operation,
        )
    }
}

fn adapt(native: Arc<dyn ScheduledTask>) -> TaskHandle {
    TaskHandle::Adapted(AdaptedHandle::adapt(native))
}

fn once(task: Task) -> RegionCallback {
    Box::new(move |_: &dyn ScheduledTask| task())
}

fn repeating(mut task: RepeatingTask) -> RepeatingCallback {
    Box::new(move |_: &dyn ScheduledTask| task())
}

/// Returns whether a task was present.
fn take_and_run(slot: &Mutex<Option<Task>>) -> bool {
    let task = slot.lock().take();
    match task {
        Some(task) => {
            task();
            true
        }
        None => false,
    }
}

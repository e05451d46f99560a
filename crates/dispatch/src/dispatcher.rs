use std::panic::{self, AssertUnwindSafe};

use worldspace_common::{Location, Owner, Ticks};

use crate::backend::{HostEnvironment, SchedulableEntity};
use crate::call::CallFuture;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Operation, TaskError};
use crate::handle::TaskHandle;
use crate::model::{ThreadingModel, process_model};
use crate::strategy::{MainThreadStrategy, RegionizedStrategy, SchedulingStrategy};

/// Facade over the host's schedulers.
///
/// The strategy is chosen once, from the cached threading model, when the
/// dispatcher is built; individual calls never re-detect.
pub struct Dispatcher {
    strategy: Box<dyn SchedulingStrategy>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Build a dispatcher for the process-wide threading model, detecting it
    /// with `host` if this is the first call in the process.
    pub fn from_host(
        host: &dyn HostEnvironment,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        let model = process_model(host, &config.marker);
        Self::for_model(model, host, config)
    }

    /// Build a dispatcher for an explicitly chosen model.
    pub fn for_model(
        model: ThreadingModel,
        host: &dyn HostEnvironment,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        let strategy: Box<dyn SchedulingStrategy> = match model {
            ThreadingModel::MainThread => {
                let scheduler = host
                    .main_thread_scheduler()
                    .ok_or(DispatchError::BackendUnavailable(model))?;
                Box::new(MainThreadStrategy::new(scheduler))
            }
            ThreadingModel::Regionized => {
                let server = host
                    .regionized_server()
                    .ok_or(DispatchError::BackendUnavailable(model))?;
                Box::new(RegionizedStrategy::new(server, &config)?)
            }
        };
        Ok(Self::with_strategy(strategy, config))
    }

    pub fn with_strategy(strategy: Box<dyn SchedulingStrategy>, config: DispatchConfig) -> Self {
        tracing::debug!(model = %strategy.model(), "dispatcher ready");
        Self { strategy, config }
    }

    pub fn model(&self) -> ThreadingModel {
        self.strategy.model()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run `task` on the main thread, or on the global region.
    pub fn run_now<F>(&self, owner: &Owner, task: F) -> Result<TaskHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.trace(Operation::RunNow, owner);
        self.strategy.run_now(owner, Box::new(task))
    }

    /// Run `task` off the scheduler threads.
    ///
    /// On a main-thread host this is fire-and-forget. A regionized host has
    /// no async scheduler, so the task runs on a fallback worker and **this
    /// call blocks until it finishes**; a panic in `task` comes back as
    /// [`DispatchError::AsyncTask`] and the returned handle is a placeholder.
    /// Do not call it from a region thread that must stay responsive.
    pub fn run_async_or_wait<F>(&self, owner: &Owner, task: F) -> Result<TaskHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.trace(Operation::RunAsync, owner);
        self.strategy.run_async_or_wait(owner, Box::new(task))
    }

    /// Run `task` after `delay`, then every `period`.
    pub fn run_repeating<F>(
        &self,
        owner: &Owner,
        task: F,
        delay: Ticks,
        period: Ticks,
    ) -> Result<TaskHandle, DispatchError>
    where
        F: FnMut() + Send + 'static,
    {
        self.trace(Operation::RunRepeating, owner);
        self.strategy.run_repeating(owner, Box::new(task), delay, period)
    }

    pub fn run_delayed<F>(
        &self,
        owner: &Owner,
        task: F,
        delay: Ticks,
    ) -> Result<TaskHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.trace(Operation::RunDelayed, owner);
        self.strategy.run_delayed(owner, Box::new(task), delay)
    }

    /// Run `task` on the region owning `location`; main-thread hosts run it now.
    pub fn run_at_location<F>(
        &self,
        owner: &Owner,
        location: &Location,
        task: F,
    ) -> Result<TaskHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.trace(Operation::RunAtLocation, owner);
        self.strategy.run_at_location(owner, location, Box::new(task))
    }

    /// Run `task` on whichever region owns `entity`; main-thread hosts run it now.
    ///
    /// If the entity is removed first, the configured
    /// [`RetiredEntityPolicy`](crate::RetiredEntityPolicy) applies.
    pub fn run_on_entity<F>(
        &self,
        owner: &Owner,
        entity: &dyn SchedulableEntity,
        task: F,
    ) -> Result<TaskHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.trace(Operation::RunOnEntity, owner);
        self.strategy.run_on_entity(owner, entity, Box::new(task), None)
    }

    /// Like [`run_on_entity`](Self::run_on_entity), running `retired` instead of
    /// `task` if the entity is removed first. An entity that is already gone
    /// gets `retired` scheduled on the global region.
    pub fn run_on_entity_or_else<F, R>(
        &self,
        owner: &Owner,
        entity: &dyn SchedulableEntity,
        task: F,
        retired: R,
    ) -> Result<TaskHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
        R: FnOnce() + Send + 'static,
    {
        self.trace(Operation::RunOnEntity, owner);
        self.strategy.run_on_entity(owner, entity, Box::new(task), Some(Box::new(retired)))
    }

    /// Run `supplier` on the main thread (or global region) and hand its result
    /// back through a future.
    ///
    /// An `Err` or panic from `supplier` completes the future with
    /// [`TaskError`]; nothing is retried.
    pub fn call_and_await<T, F>(
        &self,
        owner: &Owner,
        supplier: F,
    ) -> Result<CallFuture<T>, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        self.trace(Operation::CallAndAwait, owner);
        let (tx, future) = CallFuture::channel();
        let task = Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(supplier)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(payload) => Err(TaskError::from_panic(payload)),
            };
            let _ = tx.send(outcome);
        });

        match self.strategy.run_now(owner, task) {
            Ok(_) => Ok(future),
            Err(DispatchError::Bind { source, .. }) => Err(DispatchError::Bind {
                operation: Operation::CallAndAwait,
                source,
            }),
            Err(err) => Err(err),
        }
    }

    fn trace(&self, operation: Operation, owner: &Owner) {
        tracing::trace!(%operation, model = %self.strategy.model(), %owner, "dispatch");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("model", &self.model())
            .field("config", &self.config)
            .finish()
    }
}

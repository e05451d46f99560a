//! One scheduling strategy per threading model, chosen once by the dispatcher.

mod main_thread;
mod regionized;

pub use main_thread::MainThreadStrategy;
pub use regionized::RegionizedStrategy;

use worldspace_common::{Location, Owner, Ticks};

use crate::backend::{RepeatingTask, SchedulableEntity, Task};
use crate::error::DispatchError;
use crate::handle::TaskHandle;
use crate::model::ThreadingModel;

/// The scheduling capabilities every threading model must provide.
pub trait SchedulingStrategy: Send + Sync {
    fn model(&self) -> ThreadingModel;

    fn run_now(&self, owner: &Owner, task: Task) -> Result<TaskHandle, DispatchError>;

    /// May suspend the caller until `task` has finished; see
    /// [`Dispatcher::run_async_or_wait`](crate::Dispatcher::run_async_or_wait).
    fn run_async_or_wait(&self, owner: &Owner, task: Task) -> Result<TaskHandle, DispatchError>;

    fn run_repeating(
        &self,
        owner: &Owner,
        task: RepeatingTask,
        delay: Ticks,
        period: Ticks,
    ) -> Result<TaskHandle, DispatchError>;

    fn run_delayed(&self, owner: &Owner, task: Task, delay: Ticks)
    -> Result<TaskHandle, DispatchError>;

    fn run_at_location(
        &self,
        owner: &Owner,
        location: &Location,
        task: Task,
    ) -> Result<TaskHandle, DispatchError>;

    /// `retired`, when given, replaces the configured retired-entity policy.
    fn run_on_entity(
        &self,
        owner: &Owner,
        entity: &dyn SchedulableEntity,
        task: Task,
        retired: Option<Task>,
    ) -> Result<TaskHandle, DispatchError>;
}

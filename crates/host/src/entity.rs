use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use worldspace_common::{EntityId, Location, Owner, Ticks};
use worldspace_dispatch::{
    BindError, EntityScheduler, RegionCallback, SchedulableEntity, ScheduledTask, Task,
};

use crate::queue::Job;
use crate::regionized::RuntimeInner;
use crate::task::SimTask;

/// An entity living in a [`RegionizedRuntime`](crate::RegionizedRuntime).
///
/// Its scheduler follows it: work runs on whichever region holds the entity
/// when the work comes due.
pub struct SimEntity {
    id: EntityId,
    location: Mutex<Location>,
    alive: AtomicBool,
    this: Weak<SimEntity>,
    runtime: Weak<RuntimeInner>,
}

impl SimEntity {
    pub(crate) fn spawn(runtime: Weak<RuntimeInner>, location: Location) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: EntityId::new(),
            location: Mutex::new(location),
            alive: AtomicBool::new(true),
            this: this.clone(),
            runtime,
        })
    }

    /// An entity with no regionized runtime behind it, as seen on main-thread
    /// hosts. Asking it for a scheduler fails.
    pub fn detached(location: Location) -> Arc<Self> {
        Self::spawn(Weak::new(), location)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn location(&self) -> Location {
        self.location.lock().clone()
    }

    pub fn move_to(&self, location: Location) {
        *self.location.lock() = location;
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Remove the entity. Pending work runs its retired fallback instead.
    pub fn retire(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl SchedulableEntity for SimEntity {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn scheduler(&self) -> Result<Arc<dyn EntityScheduler>, BindError> {
        let runtime = self
            .runtime
            .upgrade()
            .ok_or(BindError::Missing("entity scheduler"))?;
        let entity = self.this.upgrade().ok_or(BindError::TargetRemoved)?;
        Ok(Arc::new(FollowingScheduler { entity, runtime }))
    }
}

struct FollowingScheduler {
    entity: Arc<SimEntity>,
    runtime: Arc<RuntimeInner>,
}

impl EntityScheduler for FollowingScheduler {
    fn run(
        &self,
        owner: &Owner,
        callback: RegionCallback,
        retired: Option<Task>,
    ) -> Result<Option<Arc<dyn ScheduledTask>>, BindError> {
        self.runtime.ensure_open()?;
        if !self.entity.is_alive() {
            return Ok(None);
        }
        let task = self.runtime.issue(owner);
        follow(
            &self.runtime,
            Arc::clone(&self.entity),
            task.clone(),
            callback,
            retired,
        );
        Ok(Some(task))
    }
}

/// Queue `callback` on the entity's current region. If the entity has moved
/// by the time it comes due, hop to the new region for the next tick.
fn follow(
    runtime: &Arc<RuntimeInner>,
    entity: Arc<SimEntity>,
    task: Arc<SimTask>,
    callback: RegionCallback,
    retired: Option<Task>,
) {
    let key = runtime.partition().region_of(&entity.location());
    let queue = runtime.region(&key);
    let hop = Arc::downgrade(runtime);

    let job = Job::Once(Box::new(move |task: &Arc<SimTask>| {
        if !entity.is_alive() {
            if let Some(retired) = retired {
                retired();
            }
            return;
        }
        let Some(runtime) = hop.upgrade() else {
            return;
        };
        if runtime.partition().region_of(&entity.location()) != key {
            tracing::trace!(entity = %entity.id(), from = %key, "entity moved, following");
            follow(&runtime, entity, Arc::clone(task), callback, retired);
            return;
        }
        callback(&**task);
    }));
    queue.schedule(task, Ticks::ZERO, job);
}

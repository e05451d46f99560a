use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use worldspace_common::{Location, Owner, Ticks};
use worldspace_dispatch::{
    BindError, GlobalRegionScheduler, RegionCallback, RegionScheduler, RegionizedServer,
    RepeatingCallback, ScheduledTask,
};

use crate::entity::SimEntity;
use crate::partition::{RegionKey, RegionPartition};
use crate::queue::{Job, RepeatingJob, TickQueue};
use crate::task::SimTask;

/// Errors from building the reference host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("region cell size must be positive, got {0}")]
    InvalidCellSize(f32),
}

/// Regionized runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Edge length of one region along X and Z.
    pub cell_size: f32,
    /// Whether task handles answer owner queries.
    pub report_owners: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            cell_size: 128.0,
            report_owners: true,
        }
    }
}

/// A global region plus lazily created grid regions, each its own
/// sequential context. There is no async scheduler.
#[derive(Clone)]
pub struct RegionizedRuntime {
    inner: Arc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    config: RegionConfig,
    partition: RegionPartition,
    global: TickQueue,
    regions: Mutex<BTreeMap<RegionKey, Arc<TickQueue>>>,
    closed: AtomicBool,
}

impl RegionizedRuntime {
    pub fn new(config: RegionConfig) -> Result<Self, HostError> {
        if config.cell_size.is_nan() || config.cell_size <= 0.0 {
            return Err(HostError::InvalidCellSize(config.cell_size));
        }
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                partition: RegionPartition::new(config.cell_size),
                config,
                global: TickQueue::new("global"),
                regions: Mutex::new(BTreeMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &RegionConfig {
        &self.inner.config
    }

    pub fn partition(&self) -> &RegionPartition {
        &self.inner.partition
    }

    /// Run one tick: the global region first, then every region concurrently,
    /// each on its own thread. Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let _span = tracing::info_span!("region_tick").entered();
        let mut ran = self.inner.global.advance();

        let regions: Vec<(RegionKey, Arc<TickQueue>)> = self
            .inner
            .regions
            .lock()
            .iter()
            .map(|(key, queue)| (key.clone(), Arc::clone(queue)))
            .collect();

        ran += thread::scope(|scope| {
            let workers: Vec<_> = regions
                .iter()
                .map(|(key, queue)| {
                    let spawned = thread::Builder::new()
                        .name(format!("region-{key}"))
                        .spawn_scoped(scope, move || queue.advance());
                    (key, queue, spawned)
                })
                .collect();

            workers
                .into_iter()
                .map(|(key, queue, spawned)| match spawned {
                    Ok(worker) => worker.join().unwrap_or(0),
                    Err(err) => {
                        tracing::warn!(%err, region = %key, "ticking region inline");
                        queue.advance()
                    }
                })
                .sum::<usize>()
        });
        drop(regions);

        // Nothing can reach an idle region except through the map.
        self.inner
            .regions
            .lock()
            .retain(|_, queue| Arc::strong_count(queue) > 1 || queue.len() > 0);
        ran
    }

    pub fn current_tick(&self) -> u64 {
        self.inner.global.current_tick()
    }

    /// Regions with pending work.
    pub fn regions(&self) -> Vec<RegionKey> {
        self.inner.regions.lock().keys().cloned().collect()
    }

    pub fn spawn_entity(&self, location: Location) -> Arc<SimEntity> {
        SimEntity::spawn(Arc::downgrade(&self.inner), location)
    }

    /// Detach all schedulers; later scheduling calls fail with
    /// [`BindError::TargetRemoved`].
    pub fn shut_down(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

impl RuntimeInner {
    pub(crate) fn partition(&self) -> &RegionPartition {
        &self.partition
    }

    pub(crate) fn ensure_open(&self) -> Result<(), BindError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BindError::TargetRemoved)
        } else {
            Ok(())
        }
    }

    pub(crate) fn region(&self, key: &RegionKey) -> Arc<TickQueue> {
        let mut regions = self.regions.lock();
        if let Some(queue) = regions.get(key) {
            return Arc::clone(queue);
        }
        tracing::debug!(region = %key, "region created");
        let queue = Arc::new(TickQueue::new(key.to_string()));
        regions.insert(key.clone(), Arc::clone(&queue));
        queue
    }

    /// Region tasks have no stable id.
    pub(crate) fn issue(&self, owner: &Owner) -> Arc<SimTask> {
        Arc::new(SimTask::new(-1, owner.clone(), true, self.config.report_owners))
    }
}

fn once(callback: RegionCallback) -> Job {
    Job::Once(Box::new(move |task: &Arc<SimTask>| callback(&**task)))
}

fn repeating(mut callback: RepeatingCallback) -> RepeatingJob {
    Box::new(move |task: &Arc<SimTask>| callback(&**task))
}

/// Schedulers hold the runtime weakly; queued work must not keep it alive.
fn attach(runtime: &Weak<RuntimeInner>) -> Result<Arc<RuntimeInner>, BindError> {
    let runtime = runtime.upgrade().ok_or(BindError::TargetRemoved)?;
    runtime.ensure_open()?;
    Ok(runtime)
}

struct GlobalRegion(Weak<RuntimeInner>);

impl GlobalRegionScheduler for GlobalRegion {
    fn run(
        &self,
        owner: &Owner,
        callback: RegionCallback,
    ) -> Result<Arc<dyn ScheduledTask>, BindError> {
        self.run_delayed(owner, callback, Ticks::ZERO)
    }

    fn run_delayed(
        &self,
        owner: &Owner,
        callback: RegionCallback,
        delay: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError> {
        let runtime = attach(&self.0)?;
        let task = runtime.issue(owner);
        runtime.global.schedule(task.clone(), delay, once(callback));
        Ok(task)
    }

    fn run_at_fixed_rate(
        &self,
        owner: &Owner,
        callback: RepeatingCallback,
        delay: Ticks,
        period: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError> {
        let runtime = attach(&self.0)?;
        let task = runtime.issue(owner);
        runtime
            .global
            .schedule_repeating(task.clone(), delay, period, repeating(callback));
        Ok(task)
    }
}

struct Regions(Weak<RuntimeInner>);

impl RegionScheduler for Regions {
    fn run(
        &self,
        owner: &Owner,
        location: &Location,
        callback: RegionCallback,
    ) -> Result<Arc<dyn ScheduledTask>, BindError> {
        self.run_delayed(owner, location, callback, Ticks::ZERO)
    }

    fn run_delayed(
        &self,
        owner: &Owner,
        location: &Location,
        callback: RegionCallback,
        delay: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError> {
        let runtime = attach(&self.0)?;
        let task = runtime.issue(owner);
        let queue = runtime.region(&runtime.partition.region_of(location));
        queue.schedule(task.clone(), delay, once(callback));
        Ok(task)
    }

    fn run_at_fixed_rate(
        &self,
        owner: &Owner,
        location: &Location,
        callback: RepeatingCallback,
        delay: Ticks,
        period: Ticks,
    ) -> Result<Arc<dyn ScheduledTask>, BindError> {
        let runtime = attach(&self.0)?;
        let task = runtime.issue(owner);
        let queue = runtime.region(&runtime.partition.region_of(location));
        queue.schedule_repeating(task.clone(), delay, period, repeating(callback));
        Ok(task)
    }
}

impl RegionizedServer for RegionizedRuntime {
    fn global_region_scheduler(&self) -> Result<Arc<dyn GlobalRegionScheduler>, BindError> {
        self.inner.ensure_open()?;
        Ok(Arc::new(GlobalRegion(Arc::downgrade(&self.inner))))
    }

    fn region_scheduler(&self) -> Result<Arc<dyn RegionScheduler>, BindError> {
        self.inner.ensure_open()?;
        Ok(Arc::new(Regions(Arc::downgrade(&self.inner))))
    }
}

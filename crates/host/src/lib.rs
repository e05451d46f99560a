//! Reference host for the dispatch layer.
//!
//! Provides both threading models in-process so dispatch behaviour can be
//! exercised end to end: a [`TickScheduler`] for main-thread hosts and a
//! [`RegionizedRuntime`] whose regions tick on their own threads.
//!
//! # Workaround
//! Regions are a fixed-size XZ grid rather than dynamically merged and split
//! areas. Ticks are driven explicitly by the embedder via `tick()`.

mod entity;
mod host;
mod partition;
mod queue;
mod regionized;
mod task;
mod tick;

#[cfg(test)]
mod scenarios;

pub use entity::SimEntity;
pub use host::SimHost;
pub use partition::{CellCoord, RegionKey, RegionPartition};
pub use regionized::{HostError, RegionConfig, RegionizedRuntime};
pub use task::SimTask;
pub use tick::TickScheduler;

pub fn crate_info() -> &'static str {
    "worldspace-host v0.1.0"
}

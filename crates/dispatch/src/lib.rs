//! Task dispatch across the two threading models a host can run under.
//!
//! A host either drives all gameplay work from one main thread, or splits the
//! world into regions that each tick on their own thread with no shared async
//! scheduler. The [`Dispatcher`] detects which model is active once and routes
//! every scheduling call to the matching host scheduler, handing back a
//! uniform [`TaskHandle`].
//!
//! # Invariants
//! - The threading model is detected at most once per [`ModelCell`]; dispatch
//!   never re-probes.
//! - No entry point drops a task silently: it is scheduled, run, or the call
//!   returns an error.
//! - Best-effort handle queries (owner, cancel, cancelled) never fail at the
//!   [`TaskHandle`] surface.

mod adapter;
mod backend;
mod call;
mod config;
mod dispatcher;
mod error;
mod executor;
mod handle;
mod model;
mod strategy;

pub use adapter::AdaptedHandle;
pub use backend::{
    EntityScheduler, GlobalRegionScheduler, HostEnvironment, MainThreadScheduler,
    MainThreadTask, RegionCallback, RegionScheduler, RegionizedServer, RepeatingCallback,
    RepeatingTask, SchedulableEntity, ScheduledTask, Task,
};
pub use call::CallFuture;
pub use config::{DispatchConfig, RetiredEntityPolicy};
pub use dispatcher::Dispatcher;
pub use error::{BindError, DispatchError, HandleError, Operation, ProbeError, TaskError};
pub use executor::{FallbackExecutor, KEEP_ALIVE};
pub use handle::{HandleKind, NativeHandle, TaskHandle, TaskId};
pub use model::{
    CapabilityProbe, ModelCell, REGION_MARKER, ThreadingModel, detect_model, detected_model,
    process_model,
};
pub use strategy::{MainThreadStrategy, RegionizedStrategy, SchedulingStrategy};

pub fn crate_info() -> &'static str {
    "worldspace-dispatch v0.1.0"
}

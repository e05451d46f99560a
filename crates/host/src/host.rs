use std::sync::Arc;

use worldspace_dispatch::{
    CapabilityProbe, HostEnvironment, MainThreadScheduler, ProbeError, REGION_MARKER,
    RegionizedServer,
};

use crate::regionized::{HostError, RegionConfig, RegionizedRuntime};
use crate::tick::TickScheduler;

/// A complete in-process host running one of the two threading models.
pub struct SimHost {
    exports: Vec<String>,
    main: Option<Arc<TickScheduler>>,
    runtime: Option<RegionizedRuntime>,
}

impl SimHost {
    /// A main-thread host. It exports no region marker.
    pub fn main_thread() -> Self {
        Self {
            exports: Vec::new(),
            main: Some(Arc::new(TickScheduler::new())),
            runtime: None,
        }
    }

    /// A regionized host exporting [`REGION_MARKER`].
    pub fn regionized(config: RegionConfig) -> Result<Self, HostError> {
        Ok(Self {
            exports: vec![REGION_MARKER.to_string()],
            main: None,
            runtime: Some(RegionizedRuntime::new(config)?),
        })
    }

    /// Export an extra symbol to capability probes.
    pub fn with_export(mut self, symbol: impl Into<String>) -> Self {
        self.exports.push(symbol.into());
        self
    }

    pub fn main_scheduler(&self) -> Option<&Arc<TickScheduler>> {
        self.main.as_ref()
    }

    pub fn runtime(&self) -> Option<&RegionizedRuntime> {
        self.runtime.as_ref()
    }

    /// Advance whichever scheduler the host runs. Returns how many tasks ran.
    pub fn tick(&self) -> usize {
        let main = self.main.as_ref().map_or(0, |main| main.tick());
        let regions = self.runtime.as_ref().map_or(0, |runtime| runtime.tick());
        main + regions
    }

    pub fn ticks(&self, count: usize) -> usize {
        (0..count).map(|_| self.tick()).sum()
    }
}

impl CapabilityProbe for SimHost {
    fn resolve_marker(&self, name: &str) -> Result<bool, ProbeError> {
        Ok(self.exports.iter().any(|symbol| symbol == name))
    }
}

impl HostEnvironment for SimHost {
    fn main_thread_scheduler(&self) -> Option<Arc<dyn MainThreadScheduler>> {
        self.main
            .clone()
            .map(|main| main as Arc<dyn MainThreadScheduler>)
    }

    fn regionized_server(&self) -> Option<Arc<dyn RegionizedServer>> {
        self.runtime
            .clone()
            .map(|runtime| Arc::new(runtime) as Arc<dyn RegionizedServer>)
    }
}

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Symbol that only regionized hosts export.
pub const REGION_MARKER: &str = "worldspace::region::RegionizedServer";

/// Which threading model the host runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingModel {
    /// One global sequential context for all main-thread work.
    MainThread,
    /// Independently ticking regions plus a global region; no async scheduler.
    Regionized,
}

impl fmt::Display for ThreadingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThreadingModel::MainThread => "main-thread",
            ThreadingModel::Regionized => "regionized",
        })
    }
}

/// By-name symbol lookup against the host. Must be side-effect free.
pub trait CapabilityProbe {
    /// `Ok(false)` is the ordinary answer on main-thread hosts.
    fn resolve_marker(&self, name: &str) -> Result<bool, ProbeError>;
}

/// Probe the host once. Any failure, including a panicking probe, reads as
/// [`ThreadingModel::MainThread`].
pub fn detect_model<P: CapabilityProbe + ?Sized>(probe: &P, marker: &str) -> ThreadingModel {
    let lookup = panic::catch_unwind(AssertUnwindSafe(|| probe.resolve_marker(marker)));
    match lookup {
        Ok(Ok(true)) => ThreadingModel::Regionized,
        Ok(Ok(false)) => ThreadingModel::MainThread,
        Ok(Err(err)) => {
            tracing::debug!(%err, marker, "marker lookup failed, assuming main-thread model");
            ThreadingModel::MainThread
        }
        Err(_) => {
            tracing::debug!(marker, "marker lookup panicked, assuming main-thread model");
            ThreadingModel::MainThread
        }
    }
}

/// Write-once holder for a detected model.
#[derive(Debug, Default)]
pub struct ModelCell {
    cell: OnceLock<ThreadingModel>,
}

impl ModelCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the cached model, running the probe only if nothing is cached yet.
    pub fn get_or_detect<P: CapabilityProbe + ?Sized>(
        &self,
        probe: &P,
        marker: &str,
    ) -> ThreadingModel {
        *self.cell.get_or_init(|| {
            let model = detect_model(probe, marker);
            tracing::info!(%model, marker, "threading model detected");
            model
        })
    }

    pub fn get(&self) -> Option<ThreadingModel> {
        self.cell.get().copied()
    }
}

static PROCESS_MODEL: ModelCell = ModelCell::new();

/// Process-wide model. The first caller's probe decides for the whole process.
pub fn process_model<P: CapabilityProbe + ?Sized>(probe: &P, marker: &str) -> ThreadingModel {
    PROCESS_MODEL.get_or_detect(probe, marker)
}

/// The process-wide model, if it has been detected.
pub fn detected_model() -> Option<ThreadingModel> {
    PROCESS_MODEL.get()
}

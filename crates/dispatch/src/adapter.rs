use std::sync::Arc;

use worldspace_common::Owner;

use crate::backend::ScheduledTask;
use crate::error::HandleError;

/// A regionized task seen through the uniform handle contract.
///
/// Failures stay as `Result`s on the `try_*` methods; the plain methods are
/// where they collapse to the best-effort defaults (no-op, `false`).
#[derive(Clone)]
pub struct AdaptedHandle {
    native: Arc<dyn ScheduledTask>,
    owner: Option<Owner>,
}

impl AdaptedHandle {
    /// Wrap a native handle, recovering its owner if the host reports one.
    pub fn adapt(native: Arc<dyn ScheduledTask>) -> Self {
        let owner = match native.owning_owner() {
            Ok(owner) => Some(owner),
            Err(err) => {
                tracing::debug!(%err, "owner unavailable on regionized task");
                None
            }
        };
        Self { native, owner }
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn try_is_cancelled(&self) -> Result<bool, HandleError> {
        self.native.is_cancelled()
    }

    pub fn try_cancel(&self) -> Result<(), HandleError> {
        self.native.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.try_is_cancelled().unwrap_or_else(|err| {
            tracing::debug!(%err, "cancelled query failed, reporting not cancelled");
            false
        })
    }

    pub fn cancel(&self) {
        if let Err(err) = self.try_cancel() {
            tracing::debug!(%err, "cancel failed, ignoring");
        }
    }
}

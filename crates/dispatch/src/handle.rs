use std::fmt;
use std::sync::Arc;

use worldspace_common::Owner;

use crate::adapter::AdaptedHandle;
use crate::backend::MainThreadTask;

/// Scheduler-assigned task id. Regionized tasks have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(i32);

impl TaskId {
    pub const UNKNOWN: TaskId = TaskId(-1);

    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> Option<i32> {
        self.is_known().then_some(self.0)
    }

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(id) => write!(f, "#{id}"),
            None => f.write_str("#?"),
        }
    }
}

/// Pass-through over a main-thread scheduler's handle.
#[derive(Clone)]
pub struct NativeHandle {
    inner: Arc<dyn MainThreadTask>,
}

impl NativeHandle {
    pub fn new(inner: Arc<dyn MainThreadTask>) -> Self {
        Self { inner }
    }
}

/// Which variant a [`TaskHandle`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Native,
    Adapted,
    Placeholder,
}

/// Uniform result of every scheduling call.
///
/// `cancel` and `is_cancelled` are safe at any time, including after the task
/// has already run.
#[derive(Clone)]
pub enum TaskHandle {
    /// Issued by the main-thread scheduler; every field is authoritative.
    Native(NativeHandle),
    /// Wraps a regionized task; id unknown, owner best-effort, always sync.
    Adapted(AdaptedHandle),
    /// Stands in for work already completed on the fallback executor.
    Placeholder,
}

impl TaskHandle {
    pub(crate) fn native(inner: Arc<dyn MainThreadTask>) -> Self {
        TaskHandle::Native(NativeHandle::new(inner))
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            TaskHandle::Native(_) => HandleKind::Native,
            TaskHandle::Adapted(_) => HandleKind::Adapted,
            TaskHandle::Placeholder => HandleKind::Placeholder,
        }
    }

    pub fn id(&self) -> TaskId {
        match self {
            TaskHandle::Native(native) => TaskId::new(native.inner.id()),
            TaskHandle::Adapted(_) | TaskHandle::Placeholder => TaskId::UNKNOWN,
        }
    }

    pub fn owner(&self) -> Option<Owner> {
        match self {
            TaskHandle::Native(native) => Some(native.inner.owner()),
            TaskHandle::Adapted(adapted) => adapted.owner().cloned(),
            TaskHandle::Placeholder => None,
        }
    }

    /// Whether the work runs on a scheduler thread rather than in the background.
    pub fn is_sync(&self) -> bool {
        match self {
            TaskHandle::Native(native) => native.inner.is_sync(),
            TaskHandle::Adapted(_) => true,
            TaskHandle::Placeholder => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            TaskHandle::Native(native) => native.inner.is_cancelled(),
            TaskHandle::Adapted(adapted) => adapted.is_cancelled(),
            TaskHandle::Placeholder => false,
        }
    }

    pub fn cancel(&self) {
        match self {
            TaskHandle::Native(native) => native.inner.cancel(),
            TaskHandle::Adapted(adapted) => adapted.cancel(),
            TaskHandle::Placeholder => {}
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .field("owner", &self.owner().as_ref().map(Owner::name))
            .field("sync", &self.is_sync())
            .finish()
    }
}
